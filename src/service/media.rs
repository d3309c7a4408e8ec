use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound for a single photo upload.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Path prefix stored photos are served under.
pub const UPLOAD_ROUTE: &str = "/uploads";

/// Replaces anything outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() {
        "photo".to_string()
    } else {
        safe
    }
}

/// `<unix millis>_<random>_<sanitized name>`.
pub fn storage_key(original_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}",
        now.timestamp_millis(),
        Uuid::new_v4().to_simple(),
        sanitize_file_name(original_name)
    )
}

/// Base URL photo links are composed from.
///
/// A configured base wins; otherwise the request's effective scheme and
/// host (already resolved from forwarding headers) are used.
pub fn public_base(configured: Option<&str>, scheme: &str, host: &str) -> String {
    match configured {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => format!("{scheme}://{host}{UPLOAD_ROUTE}"),
    }
}

pub fn url_for(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// Durable photo storage in a local directory.
#[derive(Clone, Debug)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes and syncs the photo, returning its storage key.
    pub async fn store(&self, bytes: &[u8], original_name: &str) -> Result<String, AppError> {
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(AppError::PayloadTooLarge {
                limit: MAX_PHOTO_BYTES,
            });
        }

        let key = storage_key(original_name, Utc::now());
        let mut file = fs::File::create(self.dir.join(&key)).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;

        debug!(key = %key, size = bytes.len(), "Stored photo");
        Ok(key)
    }

    /// Best-effort removal of a photo whose row never got written.
    pub async fn discard(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(key)).await {
            warn!(error = %e, key = %key, "Failed to discard orphaned photo");
        }
    }
}
