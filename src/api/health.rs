use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::error;

use crate::store::Store;

/// Liveness plus database reachability
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = Object, example = json!({ "status": "ok" })),
        (status = 500, body = Object, example = json!({ "status": "error", "error": "db_unreachable" }))
    ),
    tag = "Health"
)]
pub async fn health(store: web::Data<dyn Store>) -> HttpResponse {
    match store.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok" })),
        Err(e) => {
            error!(error = %e, "Health check failed");
            HttpResponse::InternalServerError()
                .json(json!({ "status": "error", "error": "db_unreachable" }))
        }
    }
}
