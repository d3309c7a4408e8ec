use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, verify_token},
        password::{hash_password, verify_password},
    },
    error::AppError,
    model::user::UserProfile,
    models::LoginResponse,
    store::Store,
};

/// Verified against when the username is unknown, so both failure paths do
/// the same Argon2 work.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("no-such-user").ok());

pub async fn login(
    store: &dyn Store,
    jwt_secret: &str,
    username: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<LoginResponse, AppError> {
    let Some(user) = store.find_user_by_username(username).await? else {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password(password, hash);
        }
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_access_token(&user, jwt_secret, now)?;

    Ok(LoginResponse {
        token,
        user: UserProfile::from(&user),
    })
}

/// Resolves the caller from a raw `Authorization` header value.
pub fn authenticate(authorization: Option<&str>, jwt_secret: &str) -> Result<AuthUser, AppError> {
    let header = authorization.ok_or(AppError::Unauthenticated("missing authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthenticated(
            "authorization header must start with Bearer",
        ))?;

    verify_token(token, jwt_secret).map(AuthUser::from)
}

/// Live profile for the caller; the account may have changed or gone since
/// the token was issued.
pub async fn current_profile(
    store: &dyn Store,
    identity: &AuthUser,
) -> Result<UserProfile, AppError> {
    store
        .find_user(identity.user_id)
        .await?
        .map(|u| UserProfile::from(&u))
        .ok_or(AppError::NotFound("user"))
}
