use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use dotenvy::dotenv;

/// Credentials for the first-run administrator account.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub jwt_secret: String,

    /// Zone used to render timestamps in responses and exports.
    pub timezone: Tz,

    pub upload_dir: PathBuf,
    /// Overrides the request-derived origin when composing photo links.
    pub upload_base_url: Option<String>,

    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub log_dir: String,
    pub log_level: tracing::Level,

    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let timezone_name = var("TIMEZONE").unwrap_or_else(|| "America/La_Paz".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|e| anyhow!("TIMEZONE {timezone_name:?} is not a known zone: {e}"))?;

        let bootstrap_admin = var("ADMIN_PASSWORD").map(|password| BootstrapAdmin {
            username: var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password,
            full_name: var("ADMIN_FULLNAME").unwrap_or_else(|| "Administrador".to_string()),
        });

        Ok(Self {
            server_addr: var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:4000".to_string()),
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            timezone,
            upload_dir: PathBuf::from(var("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            upload_base_url: var("UPLOAD_BASE_URL"),
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&var, "DB_ACQUIRE_TIMEOUT_SECS", 5)?),
            rate_login_per_min: parse_or(&var, "RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: parse_or(&var, "RATE_PROTECTED_PER_MIN", 1000)?,
            log_dir: var("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&var, "LOG_LEVEL", tracing::Level::INFO)?,
            bootstrap_admin,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid {key} value {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "DATABASE_URL" => Some("mysql://root@localhost/attendance_test".into()),
            "JWT_SECRET" => Some("test-secret".into()),
            _ => None,
        })
        .expect("test config is valid")
    }
}
