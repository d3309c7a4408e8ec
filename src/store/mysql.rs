use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::{
    error::AppError,
    model::{
        checkin::{Appended, Checkin, CheckinType, CheckinUser, NewCheckin},
        role::Role,
        user::{NewUser, User, UserPatch},
        work_site::WorkSite,
    },
    service::report::CheckinFilter,
    store::Store,
    utils::db_utils::{SqlValue, UpdateBuilder, execute_update},
};

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.full_name, u.password_hash, u.role,
           u.work_site_id, w.name AS work_site_name
    FROM users u
    LEFT JOIN work_sites w ON w.id = u.work_site_id
"#;

const CHECKIN_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.work_site_id, c.checkin_type, c.occurred_at,
           c.latitude, c.longitude, c.activity, c.photo_url,
           w.name AS work_site_name, u.username, u.full_name
    FROM checkins c
    JOIN work_sites w ON w.id = c.work_site_id
    JOIN users u ON u.id = c.user_id
"#;

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    full_name: String,
    password_hash: String,
    #[sqlx(try_from = "String")]
    role: Role,
    work_site_id: Option<u64>,
    work_site_name: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let work_site = match (row.work_site_id, row.work_site_name) {
            (Some(id), Some(name)) => Some(WorkSite { id, name }),
            _ => None,
        };

        User {
            id: row.id,
            username: row.username,
            full_name: row.full_name,
            password_hash: row.password_hash,
            role: row.role,
            work_site_id: row.work_site_id,
            work_site,
        }
    }
}

#[derive(FromRow)]
struct CheckinRow {
    id: u64,
    user_id: u64,
    work_site_id: u64,
    #[sqlx(try_from = "String")]
    checkin_type: CheckinType,
    occurred_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    activity: String,
    photo_url: String,
    work_site_name: String,
    username: String,
    full_name: String,
}

impl From<CheckinRow> for Checkin {
    fn from(row: CheckinRow) -> Self {
        Checkin {
            id: row.id,
            user_id: row.user_id,
            work_site_id: row.work_site_id,
            kind: row.checkin_type,
            occurred_at: row.occurred_at,
            latitude: row.latitude,
            longitude: row.longitude,
            activity: row.activity,
            photo_url: row.photo_url,
            work_site: WorkSite {
                id: row.work_site_id,
                name: row.work_site_name,
            },
            user: CheckinUser {
                id: row.user_id,
                username: row.username,
                full_name: row.full_name,
            },
        }
    }
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
    Time(DateTime<Utc>),
}

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, id: u64) -> Result<Option<User>, AppError> {
        let sql = format!("{USER_SELECT} WHERE u.id = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("{USER_SELECT} WHERE u.username = ?");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let sql = format!("{USER_SELECT} ORDER BY u.full_name ASC, u.id ASC");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn insert_user(&self, user: NewUser) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, full_name, password_hash, role, work_site_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(user.role.as_ref())
        .bind(user.work_site_id)
        .execute(&self.pool)
        .await
        .map_err(user_write_error)?;

        Ok(result.last_insert_id())
    }

    async fn update_user(&self, id: u64, patch: UserPatch) -> Result<(), AppError> {
        let mut builder = UpdateBuilder::new("users");
        builder
            .set_opt("username", patch.username.map(SqlValue::String))
            .set_opt("full_name", patch.full_name.map(SqlValue::String))
            .set_opt("password_hash", patch.password_hash.map(SqlValue::String))
            .set_opt(
                "role",
                patch.role.map(|r| SqlValue::String(r.as_ref().to_string())),
            )
            .set_opt("work_site_id", patch.work_site_id.map(SqlValue::NullableU64));

        let Some(update) = builder.build("id", id) else {
            return Ok(());
        };

        debug!(sql = %update.sql, user_id = id, "Updating user");

        execute_update(&self.pool, update)
            .await
            .map_err(user_write_error)?;
        Ok(())
    }

    async fn delete_user(&self, id: u64) -> Result<bool, AppError> {
        // checkins.user_id cascades
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_work_site(&self, id: u64) -> Result<Option<WorkSite>, AppError> {
        let site = sqlx::query_as::<_, WorkSite>("SELECT id, name FROM work_sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    async fn list_work_sites(&self) -> Result<Vec<WorkSite>, AppError> {
        let sites = sqlx::query_as::<_, WorkSite>(
            "SELECT id, name FROM work_sites ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sites)
    }

    async fn insert_work_site(&self, name: &str) -> Result<u64, AppError> {
        let result = sqlx::query("INSERT INTO work_sites (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_id())
    }

    async fn rename_work_site(&self, id: u64, name: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE work_sites SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_work_site(&self, id: u64) -> Result<bool, AppError> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE work_site_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        let checkins: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checkins WHERE work_site_id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        if users > 0 || checkins > 0 {
            return Err(work_site_in_use(users, checkins));
        }

        // A reference added after the counts still trips the FK, which maps
        // to Conflict as well.
        let result = sqlx::query("DELETE FROM work_sites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_checkin(&self, checkin: NewCheckin) -> Result<Appended, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the user serializes concurrent submissions for them.
        let locked: Option<u64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = ? FOR UPDATE")
                .bind(checkin.user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("user"));
        }

        let last: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT checkin_type, occurred_at
            FROM checkins
            WHERE user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(checkin.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let last = last
            .map(|(kind, at)| CheckinType::try_from(kind).map(|kind| (kind, at)))
            .transpose()
            .map_err(|e| AppError::Internal(format!("unknown stored checkin type: {e}")))?;
        let (kind, occurred_at) = Appended::after(last, checkin.occurred_at);

        let result = sqlx::query(
            r#"
            INSERT INTO checkins
                (user_id, work_site_id, checkin_type, occurred_at,
                 latitude, longitude, activity, photo_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(checkin.user_id)
        .bind(checkin.work_site_id)
        .bind(kind.as_ref())
        .bind(occurred_at)
        .bind(checkin.latitude)
        .bind(checkin.longitude)
        .bind(&checkin.activity)
        .bind(&checkin.photo_url)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Appended {
            id: result.last_insert_id(),
            kind,
            occurred_at,
        })
    }

    async fn find_checkins(&self, filter: &CheckinFilter) -> Result<Vec<Checkin>, AppError> {
        let mut conditions = Vec::new();
        let mut bindings = Vec::new();

        if let Some(user_id) = filter.user_id {
            conditions.push("c.user_id = ?");
            bindings.push(FilterValue::U64(user_id));
        }
        if let Some(kind) = &filter.kind {
            conditions.push("c.checkin_type = ?");
            bindings.push(FilterValue::Str(kind.as_ref()));
        }
        if let Some(from) = filter.from {
            conditions.push("c.occurred_at >= ?");
            bindings.push(FilterValue::Time(from));
        }
        if let Some(to) = filter.to {
            conditions.push("c.occurred_at <= ?");
            bindings.push(FilterValue::Time(to));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("{CHECKIN_SELECT} {where_clause} ORDER BY c.occurred_at DESC, c.id DESC");
        debug!(sql = %sql, "Fetching checkins");

        let mut query = sqlx::query_as::<_, CheckinRow>(&sql);
        for value in bindings {
            query = match value {
                FilterValue::U64(v) => query.bind(v),
                FilterValue::Str(v) => query.bind(v),
                FilterValue::Time(v) => query.bind(v),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Checkin::from).collect())
    }
}

/// Constraint failures on `users` name the column that caused them.
fn user_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict("username already exists".into());
        }
        if db.is_foreign_key_violation() {
            return AppError::Conflict("worksite does not exist".into());
        }
    }
    AppError::from(e)
}

pub(crate) fn work_site_in_use(users: i64, checkins: i64) -> AppError {
    AppError::Conflict(format!(
        "worksite is still referenced by {users} user(s) and {checkins} checkin(s)"
    ))
}
