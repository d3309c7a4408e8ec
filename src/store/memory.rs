use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::AppError,
    model::{
        checkin::{Appended, Checkin, CheckinType, CheckinUser, NewCheckin},
        user::{NewUser, User, UserPatch},
        work_site::WorkSite,
    },
    service::report::CheckinFilter,
    store::{Store, mysql::work_site_in_use},
};

/// A check-in as stored: references only, names are joined on read.
struct CheckinRow {
    id: u64,
    kind: CheckinType,
    data: NewCheckin,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    work_sites: Vec<WorkSite>,
    checkins: Vec<CheckinRow>,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve(&self, mut user: User) -> User {
        user.work_site = user
            .work_site_id
            .and_then(|id| self.work_sites.iter().find(|w| w.id == id).cloned());
        user
    }

    /// Same shape as the SQL join; rows whose user or worksite vanished
    /// are dropped.
    fn hydrate(&self, row: &CheckinRow) -> Option<Checkin> {
        let user = self.users.iter().find(|u| u.id == row.data.user_id)?;
        let work_site = self
            .work_sites
            .iter()
            .find(|w| w.id == row.data.work_site_id)?;

        Some(Checkin {
            id: row.id,
            user_id: user.id,
            work_site_id: work_site.id,
            kind: row.kind,
            occurred_at: row.data.occurred_at,
            latitude: row.data.latitude,
            longitude: row.data.longitude,
            activity: row.data.activity.clone(),
            photo_url: row.data.photo_url.clone(),
            work_site: work_site.clone(),
            user: CheckinUser {
                id: user.id,
                username: user.username.clone(),
                full_name: user.full_name.clone(),
            },
        })
    }
}

fn matches(filter: &CheckinFilter, row: &CheckinRow) -> bool {
    filter.user_id.is_none_or(|id| row.data.user_id == id)
        && filter.kind.is_none_or(|kind| row.kind == kind)
        && filter.from.is_none_or(|from| row.data.occurred_at >= from)
        && filter.to.is_none_or(|to| row.data.occurred_at <= to)
}

/// Mirrors the MySQL constraints: unique usernames, restrictive worksite
/// references, cascading check-ins on user delete.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkin_count(&self) -> usize {
        self.state.lock().unwrap().checkins.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_user(&self, id: u64) -> Result<Option<User>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(|u| state.resolve(u)))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .map(|u| state.resolve(u)))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<User> = state.users.iter().cloned().map(|u| state.resolve(u)).collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn insert_user(&self, user: NewUser) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("username already exists".into()));
        }
        let id = state.next_id();
        state.users.push(User {
            id,
            username: user.username,
            full_name: user.full_name,
            password_hash: user.password_hash,
            role: user.role,
            work_site_id: user.work_site_id,
            work_site: None,
        });
        Ok(id)
    }

    async fn update_user(&self, id: u64, patch: UserPatch) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(username) = &patch.username {
            if state.users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(AppError::Conflict("username already exists".into()));
            }
        }
        let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
            return Ok(());
        };
        if let Some(v) = patch.username {
            user.username = v;
        }
        if let Some(v) = patch.full_name {
            user.full_name = v;
        }
        if let Some(v) = patch.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.work_site_id {
            user.work_site_id = v;
        }
        Ok(())
    }

    async fn delete_user(&self, id: u64) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        state.checkins.retain(|c| c.data.user_id != id);
        Ok(state.users.len() < before)
    }

    async fn find_work_site(&self, id: u64) -> Result<Option<WorkSite>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.work_sites.iter().find(|w| w.id == id).cloned())
    }

    async fn list_work_sites(&self) -> Result<Vec<WorkSite>, AppError> {
        let state = self.state.lock().unwrap();
        let mut sites = state.work_sites.clone();
        sites.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(sites)
    }

    async fn insert_work_site(&self, name: &str) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.work_sites.push(WorkSite {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn rename_work_site(&self, id: u64, name: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(site) = state.work_sites.iter_mut().find(|w| w.id == id) {
            site.name = name.to_string();
        }
        Ok(())
    }

    async fn delete_work_site(&self, id: u64) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let users = state.users.iter().filter(|u| u.work_site_id == Some(id)).count() as i64;
        let checkins = state
            .checkins
            .iter()
            .filter(|c| c.data.work_site_id == id)
            .count() as i64;
        if users > 0 || checkins > 0 {
            return Err(work_site_in_use(users, checkins));
        }
        let before = state.work_sites.len();
        state.work_sites.retain(|w| w.id != id);
        Ok(state.work_sites.len() < before)
    }

    async fn append_checkin(&self, checkin: NewCheckin) -> Result<Appended, AppError> {
        let mut state = self.state.lock().unwrap();
        if !state.users.iter().any(|u| u.id == checkin.user_id) {
            return Err(AppError::NotFound("user"));
        }
        if !state.work_sites.iter().any(|w| w.id == checkin.work_site_id) {
            return Err(AppError::Conflict("unknown worksite".into()));
        }

        let last = state
            .checkins
            .iter()
            .filter(|c| c.data.user_id == checkin.user_id)
            .max_by(|a, b| {
                a.data
                    .occurred_at
                    .cmp(&b.data.occurred_at)
                    .then(a.id.cmp(&b.id))
            })
            .map(|c| (c.kind, c.data.occurred_at));
        let (kind, occurred_at) = Appended::after(last, checkin.occurred_at);
        let id = state.next_id();

        state.checkins.push(CheckinRow {
            id,
            kind,
            data: NewCheckin {
                occurred_at,
                ..checkin
            },
        });
        Ok(Appended {
            id,
            kind,
            occurred_at,
        })
    }

    async fn find_checkins(&self, filter: &CheckinFilter) -> Result<Vec<Checkin>, AppError> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Checkin> = state
            .checkins
            .iter()
            .filter(|c| matches(filter, c))
            .filter_map(|c| state.hydrate(c))
            .collect();
        found.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }
}
