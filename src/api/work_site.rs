use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::{
    error::AppError,
    model::work_site::WorkSite,
    service::directory::{self, WorkSiteReq},
    store::Store,
};

#[utoipa::path(
    post,
    path = "/admin/worksites",
    request_body = WorkSiteReq,
    responses(
        (status = 201, description = "Worksite created", body = WorkSite),
        (status = 400, description = "Blank name"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Worksites"
)]
pub async fn create_work_site(
    store: web::Data<dyn Store>,
    body: web::Json<WorkSiteReq>,
) -> Result<HttpResponse, AppError> {
    let site = directory::create_work_site(store.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(site))
}

#[utoipa::path(
    get,
    path = "/admin/worksites",
    responses(
        (status = 200, description = "All worksites", body = Vec<WorkSite>),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Worksites"
)]
pub async fn list_work_sites(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let sites = directory::list_work_sites(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(sites))
}

#[utoipa::path(
    get,
    path = "/admin/worksites/{id}",
    params(("id" = u64, Path, description = "Worksite id")),
    responses(
        (status = 200, body = WorkSite),
        (status = 404, description = "Worksite not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Worksites"
)]
pub async fn get_work_site(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let site = directory::get_work_site(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(site))
}

#[utoipa::path(
    put,
    path = "/admin/worksites/{id}",
    params(("id" = u64, Path, description = "Worksite id")),
    request_body = WorkSiteReq,
    responses(
        (status = 200, description = "Worksite renamed", body = WorkSite),
        (status = 400),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Worksites"
)]
pub async fn update_work_site(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    body: web::Json<WorkSiteReq>,
) -> Result<HttpResponse, AppError> {
    let site =
        directory::update_work_site(store.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(site))
}

#[utoipa::path(
    delete,
    path = "/admin/worksites/{id}",
    params(("id" = u64, Path, description = "Worksite id")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({ "ok": true })),
        (status = 404),
        (status = 409, description = "Still referenced by users or check-ins")
    ),
    security(("bearer_auth" = [])),
    tag = "Worksites"
)]
pub async fn delete_work_site(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    directory::delete_work_site(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
