use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{error::AppError, model::user::User, models::Claims};

/// Sessions are fixed at twelve hours; there is no refresh flow.
pub const TOKEN_TTL_HOURS: i64 = 12;

pub fn generate_access_token(
    user: &User,
    secret: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, AppError> {
    let expires_at = issued_at + Duration::hours(TOKEN_TTL_HOURS);

    let claims = Claims {
        user_id: user.id,
        sub: user.username.clone(),
        role: user.role,
        iat: issued_at.timestamp().max(0) as usize,
        exp: expires_at.timestamp().max(0) as usize,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthenticated("invalid or expired token"))
}
