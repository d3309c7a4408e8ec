use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::password::hash_password,
    error::AppError,
    model::{
        role::Role,
        user::{NewUser, UserPatch, UserProfile},
        work_site::WorkSite,
    },
    store::Store,
    utils::validation::{not_blank, nullable, validated},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WorkSiteReq {
    #[validate(custom(function = "not_blank"))]
    #[schema(example = "Planta Central")]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    #[validate(length(min = 1, message = "fullName is required"))]
    #[schema(example = "Ana Quispe")]
    pub full_name: String,
    #[validate(length(min = 3, message = "username needs at least 3 characters"))]
    #[schema(example = "aquispe")]
    pub username: String,
    #[validate(length(min = 6, message = "password needs at least 6 characters"))]
    #[schema(example = "secreto1")]
    pub password: String,
    /// Defaults to EMPLOYEE
    pub role: Option<Role>,
    #[schema(example = 1, nullable = true)]
    pub work_site_id: Option<u64>,
}

/// Partial update; omitted fields keep their value.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, message = "fullName must not be empty"))]
    pub full_name: Option<String>,
    #[validate(length(min = 3, message = "username needs at least 3 characters"))]
    pub username: Option<String>,
    #[validate(length(min = 6, message = "password needs at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    /// `null` removes the assignment
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<u64>, nullable = true)]
    pub work_site_id: Option<Option<u64>>,
}

async fn ensure_work_site_exists(store: &dyn Store, id: u64) -> Result<(), AppError> {
    match store.find_work_site(id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Validation(format!("worksite {id} does not exist"))),
    }
}

// ---------- worksites ----------

pub async fn create_work_site(store: &dyn Store, req: WorkSiteReq) -> Result<WorkSite, AppError> {
    let req = validated(req)?;
    let name = req.name.trim();

    let id = store.insert_work_site(name).await?;
    info!(work_site_id = id, "Worksite created");

    Ok(WorkSite {
        id,
        name: name.to_string(),
    })
}

pub async fn list_work_sites(store: &dyn Store) -> Result<Vec<WorkSite>, AppError> {
    store.list_work_sites().await
}

pub async fn get_work_site(store: &dyn Store, id: u64) -> Result<WorkSite, AppError> {
    store
        .find_work_site(id)
        .await?
        .ok_or(AppError::NotFound("worksite"))
}

pub async fn update_work_site(
    store: &dyn Store,
    id: u64,
    req: WorkSiteReq,
) -> Result<WorkSite, AppError> {
    let req = validated(req)?;
    get_work_site(store, id).await?;

    store.rename_work_site(id, req.name.trim()).await?;
    get_work_site(store, id).await
}

/// Rejected with `Conflict` while anything references the worksite.
pub async fn delete_work_site(store: &dyn Store, id: u64) -> Result<(), AppError> {
    if store.delete_work_site(id).await? {
        info!(work_site_id = id, "Worksite deleted");
        Ok(())
    } else {
        Err(AppError::NotFound("worksite"))
    }
}

// ---------- users ----------

pub async fn create_user(store: &dyn Store, req: CreateUser) -> Result<UserProfile, AppError> {
    let req = validated(req)?;
    if let Some(site) = req.work_site_id {
        ensure_work_site_exists(store, site).await?;
    }

    let id = store
        .insert_user(NewUser {
            username: req.username,
            full_name: req.full_name,
            password_hash: hash_password(&req.password)?,
            role: req.role.unwrap_or_default(),
            work_site_id: req.work_site_id,
        })
        .await?;
    info!(user_id = id, "User created");

    get_user(store, id).await
}

pub async fn list_users(store: &dyn Store) -> Result<Vec<UserProfile>, AppError> {
    let users = store.list_users().await?;
    Ok(users.iter().map(UserProfile::from).collect())
}

pub async fn get_user(store: &dyn Store, id: u64) -> Result<UserProfile, AppError> {
    store
        .find_user(id)
        .await?
        .map(|u| UserProfile::from(&u))
        .ok_or(AppError::NotFound("user"))
}

pub async fn update_user(
    store: &dyn Store,
    id: u64,
    req: UpdateUser,
) -> Result<UserProfile, AppError> {
    let req = validated(req)?;
    get_user(store, id).await?;

    if let Some(Some(site)) = req.work_site_id {
        ensure_work_site_exists(store, site).await?;
    }

    let patch = UserPatch {
        username: req.username,
        full_name: req.full_name,
        password_hash: req.password.as_deref().map(hash_password).transpose()?,
        role: req.role,
        work_site_id: req.work_site_id,
    };

    if !patch.is_empty() {
        store.update_user(id, patch).await?;
        info!(user_id = id, "User updated");
    }

    get_user(store, id).await
}

/// Hard delete; the user's check-ins go with it.
pub async fn delete_user(store: &dyn Store, id: u64) -> Result<(), AppError> {
    if store.delete_user(id).await? {
        info!(user_id = id, "User deleted");
        Ok(())
    } else {
        Err(AppError::NotFound("user"))
    }
}
