use actix_web::{HttpResponse, web};
use serde_json::json;

use crate::{
    error::AppError,
    model::user::UserProfile,
    service::directory::{self, CreateUser, UpdateUser},
    store::Store,
};

/// Create a user account
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Validation error or unknown worksite"),
        (status = 401),
        (status = 403),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    store: web::Data<dyn Store>,
    body: web::Json<CreateUser>,
) -> Result<HttpResponse, AppError> {
    let user = directory::create_user(store.get_ref(), body.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users with their worksite", body = Vec<UserProfile>),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(store: web::Data<dyn Store>) -> Result<HttpResponse, AppError> {
    let users = directory::list_users(store.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, body = UserProfile),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let user = directory::get_user(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Partially update a user
///
/// Omitted fields are untouched; `"workSiteId": null` clears the assignment.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "Updated user", body = UserProfile),
        (status = 400),
        (status = 404),
        (status = 409, description = "Username already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    body: web::Json<UpdateUser>,
) -> Result<HttpResponse, AppError> {
    let user = directory::update_user(store.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// Delete a user and their check-ins
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = u64, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted", body = Object, example = json!({ "ok": true })),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    directory::delete_user(store.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
