use crate::{
    auth::authenticator::authenticate, config::Config, error::AppError, model::role::Role,
    models::Claims,
};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, http::header::HeaderMap, web::Data,
};
use futures::future::{Ready, ready};

/// Identity of the caller as carried by their token.
///
/// The role is trusted until the token expires; it is not re-read from the
/// database per request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// The `Authorization` header, if present and readable.
pub fn authorization_header(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    headers
        .get("Authorization")
        .map(|h| {
            h.to_str()
                .map_err(|_| AppError::Unauthenticated("invalid authorization header encoding"))
        })
        .transpose()
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => return ready(Err(AppError::Internal("app config missing".into()))),
        };

        ready(
            authorization_header(req.headers())
                .and_then(|header| authenticate(header, &config.jwt_secret)),
        )
    }
}
