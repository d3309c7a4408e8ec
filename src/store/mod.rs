use async_trait::async_trait;

use crate::{
    error::AppError,
    model::{
        checkin::{Appended, Checkin, NewCheckin},
        user::{NewUser, User, UserPatch},
        work_site::WorkSite,
    },
    service::report::CheckinFilter,
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// Everything the services need from persistent storage.
///
/// Lists come back in their display order: worksites by name, users by full
/// name, check-ins newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    async fn find_user(&self, id: u64) -> Result<Option<User>, AppError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    async fn list_users(&self) -> Result<Vec<User>, AppError>;
    /// Fails with `Conflict` on a duplicate username.
    async fn insert_user(&self, user: NewUser) -> Result<u64, AppError>;
    async fn update_user(&self, id: u64, patch: UserPatch) -> Result<(), AppError>;
    /// Removes the user and their check-ins. `false` if no such user.
    async fn delete_user(&self, id: u64) -> Result<bool, AppError>;

    async fn find_work_site(&self, id: u64) -> Result<Option<WorkSite>, AppError>;
    async fn list_work_sites(&self) -> Result<Vec<WorkSite>, AppError>;
    async fn insert_work_site(&self, name: &str) -> Result<u64, AppError>;
    async fn rename_work_site(&self, id: u64, name: &str) -> Result<(), AppError>;
    /// `false` if no such worksite; `Conflict` while users or check-ins
    /// still reference it.
    async fn delete_work_site(&self, id: u64) -> Result<bool, AppError>;

    /// Appends a check-in, choosing its type and final timestamp from the
    /// user's latest one (see [`Appended::after`]). Reading the latest and
    /// inserting are serialized per user.
    async fn append_checkin(&self, checkin: NewCheckin) -> Result<Appended, AppError>;
    async fn find_checkins(&self, filter: &CheckinFilter) -> Result<Vec<Checkin>, AppError>;
}
