use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{role::Role, work_site::WorkSite};

/// A user account as stored, with its assigned worksite resolved.
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub work_site_id: Option<u64>,
    pub work_site: Option<WorkSite>,
}

/// What clients get to see of a user. Never carries the hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 7,
    "fullName": "Ana Quispe",
    "username": "aquispe",
    "role": "EMPLOYEE",
    "workSiteId": 1,
    "workSite": { "id": 1, "name": "Planta Central" }
}))]
pub struct UserProfile {
    pub id: u64,
    pub full_name: String,
    pub username: String,
    pub role: Role,
    #[schema(nullable = true)]
    pub work_site_id: Option<u64>,
    #[schema(nullable = true)]
    pub work_site: Option<WorkSite>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            role: user.role,
            work_site_id: user.work_site_id,
            work_site: user.work_site.clone(),
        }
    }
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub work_site_id: Option<u64>,
}

/// Partial update. `None` leaves a column untouched; for the worksite,
/// `Some(None)` clears the assignment.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub work_site_id: Option<Option<u64>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.full_name.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.work_site_id.is_none()
    }
}
