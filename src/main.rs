use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, http::header};
use anyhow::Context;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::routes::RateLimits;
use crate::service::media::{MediaStore, UPLOAD_ROUTE};
use crate::store::{Store, mysql::MySqlStore};
use crate::utils::seed_admin::seed_admin;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, timezone = %config.timezone, "Server starting...");

    let pool = init_db(&config).await?;
    let store: Arc<dyn Store> = Arc::new(MySqlStore::new(pool));

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(store.as_ref(), admin).await?;
    }

    let media = MediaStore::open(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to prepare upload dir {:?}", config.upload_dir))?;
    let limits = RateLimits::from_config(&config)?;
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .supports_credentials()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

        App::new()
            .wrap(NormalizePath::trim())
            .wrap(cors)
            .wrap(DefaultHeaders::new().add(("Access-Control-Allow-Private-Network", "true")))
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard so JS/CSS assets resolve
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .service(actix_files::Files::new(UPLOAD_ROUTE, media.dir()))
            .app_data(Data::from(store.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(media.clone()))
            .configure(|cfg| routes::configure(cfg, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
