use crate::{
    auth::{auth::AuthUser, authenticator},
    config::Config,
    error::AppError,
    model::user::UserProfile,
    models::{LoginReqDto, LoginResponse},
    store::Store,
    utils::validation::validated,
};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::{debug, info, instrument};

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "error": "invalid_credentials",
            "message": "invalid credentials"
        })),
        (status = 429, description = "Too many login attempts")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(store, config, body),
    fields(username = %body.username)
)]
pub async fn login(
    body: web::Json<LoginReqDto>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");
    let body = validated(body.into_inner())?;

    let result = authenticator::login(
        store.get_ref(),
        &config.jwt_secret,
        &body.username,
        &body.password,
        Utc::now(),
    )
    .await;

    match &result {
        Ok(resp) => info!(user_id = resp.user.id, "Login successful"),
        Err(AppError::InvalidCredentials) => info!("Invalid credentials"),
        Err(e) => debug!(error = %e, "Login failed"),
    }

    Ok(HttpResponse::Ok().json(result?))
}

/// Profile of the authenticated caller
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let profile = authenticator::current_profile(store.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(profile))
}
