use crate::{
    api::{checkin, health, report, user, work_site},
    auth::{
        handlers,
        middleware::{admin_middleware, auth_middleware},
    },
    config::Config,
    error::AppError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once so every worker shares the same quota.
#[derive(Clone)]
pub struct RateLimits {
    login: Limiter,
    protected: Limiter,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            login: build_limiter(config.rate_login_per_min)?,
            protected: build_limiter(config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min}/min"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

// Malformed bodies, query strings and path ids all answer as validation errors.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _| AppError::Validation(format!("invalid JSON body: {err}")).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _| AppError::Validation(format!("invalid query string: {err}")).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _| AppError::Validation(format!("invalid path: {err}")).into())
}

pub fn configure(cfg: &mut web::ServiceConfig, limits: &RateLimits) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config());

    // Public routes
    cfg.route("/health", web::get().to(health::health));

    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/me")
                    .wrap(from_fn(auth_middleware))
                    .wrap(limits.protected.clone())
                    .route(web::get().to(handlers::me)),
            ),
    );

    // Any authenticated user
    cfg.service(
        web::scope("/checkins")
            .wrap(from_fn(auth_middleware))
            .wrap(limits.protected.clone())
            .service(web::resource("").route(web::post().to(checkin::submit_checkin)))
            .service(web::resource("/me").route(web::get().to(checkin::my_checkins))),
    );

    // Admin only; auth_middleware runs first
    cfg.service(
        web::scope("/admin")
            .wrap(from_fn(admin_middleware))
            .wrap(from_fn(auth_middleware))
            .wrap(limits.protected.clone())
            .service(
                web::scope("/worksites")
                    // /admin/worksites
                    .service(
                        web::resource("")
                            .route(web::post().to(work_site::create_work_site))
                            .route(web::get().to(work_site::list_work_sites)),
                    )
                    // /admin/worksites/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(work_site::get_work_site))
                            .route(web::put().to(work_site::update_work_site))
                            .route(web::delete().to(work_site::delete_work_site)),
                    ),
            )
            .service(
                web::scope("/users")
                    // /admin/users
                    .service(
                        web::resource("")
                            .route(web::post().to(user::create_user))
                            .route(web::get().to(user::list_users)),
                    )
                    // /admin/users/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(user::get_user))
                            .route(web::put().to(user::update_user))
                            .route(web::delete().to(user::delete_user)),
                    ),
            )
            .service(
                web::scope("/checkins")
                    .service(web::resource("").route(web::get().to(report::list_checkins)))
                    .service(
                        web::resource("/export").route(web::get().to(report::export_checkins)),
                    ),
            ),
    );
}
