use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_xlsxwriter::{Format, Workbook};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    model::checkin::{Checkin, CheckinType},
    store::Store,
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Registros";

/// (header, column width)
const COLUMNS: [(&str, f64); 7] = [
    ("Fecha", 12.0),
    ("Hora", 10.0),
    ("Usuario", 24.0),
    ("Tipo", 10.0),
    ("Foto", 40.0),
    ("Actividad", 40.0),
    ("Ubicacion", 28.0),
];

/// Conjunctive check-in filter. Unset fields do not constrain; both time
/// bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckinFilter {
    pub user_id: Option<u64>,
    pub kind: Option<CheckinType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl CheckinFilter {
    pub fn for_user(user_id: u64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

/// Query string accepted by the admin listing and export endpoints.
///
/// Everything arrives as text so that empty form fields mean "no filter".
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CheckinQuery {
    /// Only check-ins of this user id
    pub employee_id: Option<String>,
    /// `IN` or `OUT`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Lower bound: RFC 3339 instant, local `YYYY-MM-DDTHH:MM[:SS]` or `YYYY-MM-DD`
    pub from: Option<String>,
    /// Upper bound, inclusive; a bare date covers that whole day
    pub to: Option<String>,
}

impl CheckinQuery {
    pub fn into_filter(self, tz: &Tz) -> Result<CheckinFilter, AppError> {
        let employee_id = non_empty(self.employee_id)
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|_| AppError::Validation(format!("employeeId {raw:?} is not an id")))
            })
            .transpose()?;

        let kind = non_empty(self.kind)
            .map(|raw| {
                raw.parse::<CheckinType>()
                    .map_err(|_| AppError::Validation(format!("type {raw:?} must be IN or OUT")))
            })
            .transpose()?;

        let from = non_empty(self.from)
            .map(|raw| parse_bound(&raw, tz, Bound::Start))
            .transpose()?;
        let to = non_empty(self.to)
            .map(|raw| parse_bound(&raw, tz, Bound::End))
            .transpose()?;

        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppError::Validation("from must not be after to".into()));
            }
        }

        Ok(CheckinFilter {
            user_id: employee_id,
            kind,
            from,
            to,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone, Copy, PartialEq)]
enum Bound {
    Start,
    End,
}

/// Instants are taken as given; naive dates and times are read in `tz`.
fn parse_bound(raw: &str, tz: &Tz, bound: Bound) -> Result<DateTime<Utc>, AppError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            match bound {
                Bound::Start => date.and_hms_opt(0, 0, 0),
                Bound::End => date.and_hms_milli_opt(23, 59, 59, 999),
            }
        })
        .ok_or_else(|| AppError::Validation(format!("{raw:?} is not a date or date-time")))?;

    let local = tz.from_local_datetime(&naive);
    let resolved = match bound {
        Bound::Start => local.earliest(),
        Bound::End => local.latest(),
    };

    resolved
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation(format!("{raw:?} does not exist in {tz}")))
}

pub async fn filter_checkins(
    store: &dyn Store,
    filter: &CheckinFilter,
) -> Result<Vec<Checkin>, AppError> {
    store.find_checkins(filter).await
}

/// One spreadsheet row, already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub date: String,
    pub time: String,
    pub user: String,
    pub kind: &'static str,
    pub photo: String,
    pub activity: String,
    pub location: String,
}

impl ExportRow {
    pub fn new(checkin: &Checkin, tz: &Tz) -> Self {
        let local = checkin.occurred_at.with_timezone(tz);

        Self {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M:%S").to_string(),
            user: checkin.user.display_name().to_string(),
            kind: checkin.kind.label(),
            photo: checkin.photo_url.clone(),
            activity: checkin.activity.clone(),
            location: format!("{}, {}", checkin.latitude, checkin.longitude),
        }
    }

    fn cells(&self) -> [&str; 7] {
        [
            &self.date,
            &self.time,
            &self.user,
            self.kind,
            &self.photo,
            &self.activity,
            &self.location,
        ]
    }
}

pub fn render_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, (title, width)) in COLUMNS.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, *width)?;
        sheet.write_string_with_format(0, col, *title, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        for (col, value) in row.cells().iter().enumerate() {
            sheet.write_string(r, col as u16, *value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

pub fn export_file_name(now: DateTime<Utc>, tz: &Tz) -> String {
    format!(
        "registros_{}.xlsx",
        now.with_timezone(tz).format("%Y%m%d_%H%M%S")
    )
}

pub struct ExportDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub rows: usize,
}

/// Runs the filter and renders the matches as an `.xlsx` workbook.
pub async fn export_checkins(
    store: &dyn Store,
    filter: &CheckinFilter,
    tz: &Tz,
    now: DateTime<Utc>,
) -> Result<ExportDocument, AppError> {
    let checkins = filter_checkins(store, filter).await?;
    let rows: Vec<ExportRow> = checkins.iter().map(|c| ExportRow::new(c, tz)).collect();

    Ok(ExportDocument {
        file_name: export_file_name(now, tz),
        bytes: render_workbook(&rows)?,
        rows: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::checkin::NewCheckin,
        service::test_support::{seed_site, seed_user},
        store::memory::MemoryStore,
    };
    use chrono::Duration;
    use chrono_tz::America::La_Paz;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    async fn append(store: &MemoryStore, user_id: u64, site_id: u64, when: DateTime<Utc>) {
        store
            .append_checkin(NewCheckin {
                user_id,
                work_site_id: site_id,
                occurred_at: when,
                latitude: -16.5,
                longitude: -68.15,
                activity: "Ronda".into(),
                photo_url: "http://h/uploads/p.jpg".into(),
            })
            .await
            .unwrap();
    }

    #[actix_web::test]
    async fn type_filter_returns_only_entries_newest_first() {
        let store = MemoryStore::new();
        let site = seed_site(&store, "Norte").await;
        let user = seed_user(&store, "lmamani", Some(site)).await;

        // IN, OUT, IN, OUT, IN
        for i in 0..5 {
            append(&store, user, site, at(8 + i, 0)).await;
        }

        let filter = CheckinFilter {
            kind: Some(CheckinType::In),
            ..CheckinFilter::default()
        };
        let found = filter_checkins(&store, &filter).await.unwrap();

        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|c| c.kind == CheckinType::In));
        assert_eq!(
            found.iter().map(|c| c.occurred_at).collect::<Vec<_>>(),
            vec![at(12, 0), at(10, 0), at(8, 0)]
        );
    }

    #[actix_web::test]
    async fn time_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let site = seed_site(&store, "Norte").await;
        let user = seed_user(&store, "lmamani", Some(site)).await;
        for h in [7, 9, 11, 13] {
            append(&store, user, site, at(h, 0)).await;
        }

        let filter = CheckinFilter {
            from: Some(at(9, 0)),
            to: Some(at(11, 0)),
            ..CheckinFilter::default()
        };
        let found = filter_checkins(&store, &filter).await.unwrap();

        assert_eq!(
            found.iter().map(|c| c.occurred_at).collect::<Vec<_>>(),
            vec![at(11, 0), at(9, 0)]
        );
    }

    #[actix_web::test]
    async fn employee_filter_is_exact() {
        let store = MemoryStore::new();
        let site = seed_site(&store, "Norte").await;
        let a = seed_user(&store, "ana", Some(site)).await;
        let b = seed_user(&store, "beto", Some(site)).await;
        append(&store, a, site, at(8, 0)).await;
        append(&store, b, site, at(9, 0)).await;
        append(&store, a, site, at(10, 0)).await;

        let found = filter_checkins(&store, &CheckinFilter::for_user(a)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|c| c.user_id == a));
    }

    #[test]
    fn query_parses_into_filter() {
        let query = CheckinQuery {
            employee_id: Some("7".into()),
            kind: Some("OUT".into()),
            from: Some("2024-01-01".into()),
            to: Some("2024-01-31".into()),
        };
        let filter = query.into_filter(&La_Paz).unwrap();

        assert_eq!(filter.user_id, Some(7));
        assert_eq!(filter.kind, Some(CheckinType::Out));
        // Midnight in La Paz is 04:00 UTC.
        assert_eq!(
            filter.from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap())
        );
        assert_eq!(
            filter.to,
            Some(
                Utc.with_ymd_and_hms(2024, 2, 1, 3, 59, 59).unwrap() + Duration::milliseconds(999)
            )
        );
    }

    #[test]
    fn empty_query_fields_do_not_filter() {
        let query = CheckinQuery {
            employee_id: Some("".into()),
            kind: Some(" ".into()),
            from: None,
            to: Some("".into()),
        };
        assert_eq!(query.into_filter(&La_Paz).unwrap(), CheckinFilter::default());
    }

    #[test]
    fn rfc3339_bounds_keep_their_offset() {
        let query = CheckinQuery {
            from: Some("2024-01-01T03:30:00Z".into()),
            ..CheckinQuery::default()
        };
        let filter = query.into_filter(&La_Paz).unwrap();
        assert_eq!(
            filter.from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 0).unwrap())
        );
    }

    #[test]
    fn bad_query_values_are_validation_errors() {
        let bad = [
            CheckinQuery {
                employee_id: Some("abc".into()),
                ..CheckinQuery::default()
            },
            CheckinQuery {
                kind: Some("LUNCH".into()),
                ..CheckinQuery::default()
            },
            CheckinQuery {
                from: Some("yesterday".into()),
                ..CheckinQuery::default()
            },
            CheckinQuery {
                from: Some("2024-02-01".into()),
                to: Some("2024-01-01".into()),
                ..CheckinQuery::default()
            },
        ];
        for query in bad {
            assert!(matches!(
                query.into_filter(&La_Paz),
                Err(AppError::Validation(_))
            ));
        }
    }

    fn sample(occurred_at: DateTime<Utc>, kind: CheckinType, full_name: &str) -> Checkin {
        Checkin {
            id: 1,
            user_id: 2,
            work_site_id: 3,
            kind,
            occurred_at,
            latitude: -16.5,
            longitude: -68.125,
            activity: "Mantenimiento".into(),
            photo_url: "http://h/uploads/x.jpg".into(),
            work_site: crate::model::work_site::WorkSite {
                id: 3,
                name: "Norte".into(),
            },
            user: crate::model::checkin::CheckinUser {
                id: 2,
                username: "jperez".into(),
                full_name: full_name.into(),
            },
        }
    }

    #[test]
    fn export_row_splits_date_and_time_in_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 0).unwrap();
        let row = ExportRow::new(&sample(instant, CheckinType::In, "Juan Perez"), &La_Paz);

        assert_eq!(row.date, "2023-12-31");
        assert_eq!(row.time, "23:30:00");
        assert_eq!(row.user, "Juan Perez");
        assert_eq!(row.kind, "Ingreso");
        assert_eq!(row.location, "-16.5, -68.125");
        assert_eq!(row.photo, "http://h/uploads/x.jpg");
    }

    #[test]
    fn export_row_falls_back_to_username() {
        let row = ExportRow::new(&sample(at(12, 0), CheckinType::Out, ""), &La_Paz);
        assert_eq!(row.user, "jperez");
        assert_eq!(row.kind, "Salida");
    }

    #[test]
    fn file_name_is_stamped_in_zone() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 30, 5).unwrap();
        assert_eq!(export_file_name(now, &La_Paz), "registros_20231231_233005.xlsx");
    }

    #[actix_web::test]
    async fn export_renders_one_row_per_record() {
        let store = MemoryStore::new();
        let site = seed_site(&store, "Norte").await;
        let user = seed_user(&store, "lmamani", Some(site)).await;
        for h in [8, 12, 14] {
            append(&store, user, site, at(h, 0)).await;
        }

        let doc = export_checkins(&store, &CheckinFilter::default(), &La_Paz, at(18, 0))
            .await
            .unwrap();

        assert_eq!(doc.rows, 3);
        assert!(doc.file_name.starts_with("registros_"));
        // xlsx is a zip container
        assert_eq!(&doc.bytes[..2], b"PK");
    }
}
