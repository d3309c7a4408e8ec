use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::work_site::WorkSite;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CheckinType {
    In,
    Out,
}

impl CheckinType {
    /// Type of the next check-in given the user's latest one.
    ///
    /// No previous record or an exit means the next is an entry; an entry
    /// is always followed by an exit. There is no day boundary.
    pub fn following(last: Option<CheckinType>) -> CheckinType {
        match last {
            Some(CheckinType::In) => CheckinType::Out,
            Some(CheckinType::Out) | None => CheckinType::In,
        }
    }

    /// Label used in exported reports.
    pub fn label(&self) -> &'static str {
        match self {
            CheckinType::In => "Ingreso",
            CheckinType::Out => "Salida",
        }
    }
}

impl TryFrom<String> for CheckinType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckinUser {
    pub id: u64,
    pub username: String,
    pub full_name: String,
}

impl CheckinUser {
    /// Full name, or the username when no full name was recorded.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

/// One persisted attendance event with its worksite and owner resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkin {
    pub id: u64,
    pub user_id: u64,
    pub work_site_id: u64,
    pub kind: CheckinType,
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub activity: String,
    pub photo_url: String,
    pub work_site: WorkSite,
    pub user: CheckinUser,
}

/// A check-in ready to be appended. Its type is decided at insert time.
#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub user_id: u64,
    pub work_site_id: u64,
    pub occurred_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub activity: String,
    pub photo_url: String,
}

/// What the store decided when appending: the row id, the type and the
/// effective timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appended {
    pub id: u64,
    pub kind: CheckinType,
    pub occurred_at: DateTime<Utc>,
}

impl Appended {
    /// Places a new check-in after `last`, the user's latest one.
    ///
    /// A request stamped before the latest record is moved up to it so
    /// that time order and the IN/OUT alternation never disagree; equal
    /// stamps are ordered by id.
    pub fn after(
        last: Option<(CheckinType, DateTime<Utc>)>,
        requested: DateTime<Utc>,
    ) -> (CheckinType, DateTime<Utc>) {
        let kind = CheckinType::following(last.map(|(kind, _)| kind));
        let occurred_at = match last {
            Some((_, at)) if at > requested => at,
            _ => requested,
        };
        (kind, occurred_at)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 42,
    "userId": 7,
    "workSiteId": 1,
    "type": "IN",
    "occurredAt": "2024-01-01T12:30:00Z",
    "occurredAtLocal": "2024-01-01T08:30:00-04:00",
    "latitude": -16.5,
    "longitude": -68.15,
    "activity": "Inventario",
    "photoUrl": "http://localhost:4000/uploads/1704112200000_0f8c_foto.jpg",
    "workSite": { "id": 1, "name": "Planta Central" },
    "user": { "id": 7, "username": "aquispe", "fullName": "Ana Quispe" }
}))]
pub struct CheckinResponse {
    pub id: u64,
    pub user_id: u64,
    pub work_site_id: u64,
    #[serde(rename = "type")]
    pub kind: CheckinType,
    #[schema(value_type = String, format = "date-time")]
    pub occurred_at: DateTime<Utc>,
    /// Same instant rendered in the configured timezone.
    #[schema(value_type = String, format = "date-time")]
    pub occurred_at_local: String,
    pub latitude: f64,
    pub longitude: f64,
    pub activity: String,
    pub photo_url: String,
    pub work_site: WorkSite,
    pub user: CheckinUser,
}

impl CheckinResponse {
    pub fn new(checkin: Checkin, tz: &Tz) -> Self {
        Self {
            occurred_at_local: checkin.occurred_at.with_timezone(tz).to_rfc3339(),
            id: checkin.id,
            user_id: checkin.user_id,
            work_site_id: checkin.work_site_id,
            kind: checkin.kind,
            occurred_at: checkin.occurred_at,
            latitude: checkin.latitude,
            longitude: checkin.longitude,
            activity: checkin.activity,
            photo_url: checkin.photo_url,
            work_site: checkin.work_site,
            user: checkin.user,
        }
    }
}
