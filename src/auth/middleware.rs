use crate::auth::auth::{AuthUser, authorization_header};
use crate::auth::authenticator::authenticate;
use crate::config::Config;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

/// Requires a valid bearer token and stashes the caller's [`AuthUser`] in
/// the request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let identity = match authorization_header(req.headers())
        .and_then(|header| authenticate(header, &config.jwt_secret))
    {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(error = %e, path = %req.path(), "Rejected unauthenticated request");
            return Ok(req.into_response(e.error_response()));
        }
    };

    tracing::debug!(user_id = identity.user_id, username = %identity.username, "Authenticated");
    req.extensions_mut().insert(identity);

    next.call(req).await
}

/// Requires the authenticated caller to be an admin. Must run after
/// [`auth_middleware`].
pub async fn admin_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let verdict = req
        .extensions()
        .get::<AuthUser>()
        .map(AuthUser::require_admin);

    match verdict {
        Some(Ok(())) => next.call(req).await,
        Some(Err(e)) => Ok(req.into_response(e.error_response())),
        None => Ok(req.into_response(
            AppError::Unauthenticated("authentication required").error_response(),
        )),
    }
}
