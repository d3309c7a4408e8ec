use anyhow::{Context, Result};
use tracing::info;

use crate::{
    auth::password::hash_password,
    config::BootstrapAdmin,
    model::{role::Role, user::NewUser},
    store::Store,
};

/// Creates the configured admin account unless that username already exists.
///
/// Returns whether an account was created.
pub async fn seed_admin(store: &dyn Store, admin: &BootstrapAdmin) -> Result<bool> {
    if store
        .find_user_by_username(&admin.username)
        .await
        .context("Failed to look up bootstrap admin")?
        .is_some()
    {
        info!(username = %admin.username, "Bootstrap admin already present");
        return Ok(false);
    }

    let id = store
        .insert_user(NewUser {
            username: admin.username.clone(),
            full_name: admin.full_name.clone(),
            password_hash: hash_password(&admin.password)?,
            role: Role::Admin,
            work_site_id: None,
        })
        .await
        .context("Failed to create bootstrap admin")?;

    info!(user_id = id, username = %admin.username, "Bootstrap admin created");
    Ok(true)
}
