use chrono::{DateTime, SubsecRound, Utc};
use tracing::{info, instrument, warn};

use crate::{
    error::AppError,
    model::checkin::{Checkin, CheckinUser, NewCheckin},
    service::{
        media::{MediaStore, url_for},
        report::CheckinFilter,
    },
    store::Store,
};

/// A photo received with a check-in, fully buffered.
#[derive(Debug)]
pub struct UploadedPhoto {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// Raw check-in form fields as they arrived.
#[derive(Debug, Default)]
pub struct CheckinSubmission {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub activity: Option<String>,
    pub photo: Option<UploadedPhoto>,
}

struct ValidSubmission {
    latitude: f64,
    longitude: f64,
    activity: String,
    photo: UploadedPhoto,
}

fn parse_coordinate(name: &str, raw: Option<&str>) -> Result<f64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))?;

    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::Validation(format!("{name} must be a finite number")))
}

impl CheckinSubmission {
    fn validate(self) -> Result<ValidSubmission, AppError> {
        let latitude = parse_coordinate("latitude", self.latitude.as_deref())?;
        let longitude = parse_coordinate("longitude", self.longitude.as_deref())?;

        let activity = self
            .activity
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| AppError::Validation("activity is required".into()))?;

        let photo = self
            .photo
            .filter(|p| !p.bytes.is_empty())
            .ok_or_else(|| AppError::Validation("photo is required".into()))?;

        Ok(ValidSubmission {
            latitude,
            longitude,
            activity,
            photo,
        })
    }
}

/// Records a check-in for `user_id`.
///
/// The photo is written before the row; if the row cannot be written the
/// photo is discarded again. `photo_base` is the URL prefix stored links are
/// built from, and `now` is the server clock at arrival. The recorded time is
/// `now` at millisecond precision, moved up to the user's latest check-in if
/// that one is newer.
#[instrument(name = "checkin_submit", skip(store, media, submission, photo_base))]
pub async fn submit(
    store: &dyn Store,
    media: &MediaStore,
    photo_base: &str,
    user_id: u64,
    submission: CheckinSubmission,
    now: DateTime<Utc>,
) -> Result<Checkin, AppError> {
    let valid = submission.validate()?;

    let user = store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let work_site = user.work_site.clone().ok_or_else(|| {
        AppError::PreconditionFailed("user has no assigned worksite".into())
    })?;

    let key = media
        .store(&valid.photo.bytes, &valid.photo.original_name)
        .await?;
    let photo_url = url_for(photo_base, &key);

    let draft = NewCheckin {
        user_id: user.id,
        work_site_id: work_site.id,
        occurred_at: now.trunc_subsecs(3),
        latitude: valid.latitude,
        longitude: valid.longitude,
        activity: valid.activity,
        photo_url,
    };

    let appended = match store.append_checkin(draft.clone()).await {
        Ok(appended) => appended,
        Err(e) => {
            warn!(error = %e, key = %key, "Checkin insert failed, discarding photo");
            media.discard(&key).await;
            return Err(e);
        }
    };

    info!(
        checkin_id = appended.id,
        kind = %appended.kind,
        work_site_id = work_site.id,
        "Checkin recorded"
    );

    Ok(Checkin {
        id: appended.id,
        user_id: user.id,
        work_site_id: work_site.id,
        kind: appended.kind,
        occurred_at: appended.occurred_at,
        latitude: draft.latitude,
        longitude: draft.longitude,
        activity: draft.activity,
        photo_url: draft.photo_url,
        work_site,
        user: CheckinUser {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
        },
    })
}

/// The caller's own check-ins, newest first. Unpaginated.
pub async fn list_mine(store: &dyn Store, user_id: u64) -> Result<Vec<Checkin>, AppError> {
    store.find_checkins(&CheckinFilter::for_user(user_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{checkin::CheckinType, user::UserPatch},
        service::{
            media::MAX_PHOTO_BYTES,
            test_support::{seed_site, seed_user},
        },
        store::memory::MemoryStore,
    };
    use chrono::{Duration, TimeZone};
    use futures::future::join_all;

    const BASE: &str = "http://localhost:4000/uploads";

    fn form(lat: &str, lon: &str, activity: &str) -> CheckinSubmission {
        CheckinSubmission {
            latitude: Some(lat.into()),
            longitude: Some(lon.into()),
            activity: Some(activity.into()),
            photo: Some(UploadedPhoto {
                original_name: "selfie.jpg".into(),
                bytes: b"\xff\xd8\xff\xe0fake-jpeg".to_vec(),
            }),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    async fn setup() -> (MemoryStore, MediaStore, tempfile::TempDir, u64, u64) {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::open(dir.path()).await.unwrap();
        let store = MemoryStore::new();
        let site = seed_site(&store, "Planta Central").await;
        let user = seed_user(&store, "ccondori", Some(site)).await;
        (store, media, dir, site, user)
    }

    fn stored_files(dir: &tempfile::TempDir) -> usize {
        std::fs::read_dir(dir.path()).unwrap().count()
    }

    #[actix_web::test]
    async fn first_checkin_is_in_and_then_alternates() {
        let (store, media, _dir, _site, user) = setup().await;

        let mut kinds = Vec::new();
        for i in 0..5 {
            let checkin = submit(
                &store,
                &media,
                BASE,
                user,
                form("-16.5", "-68.15", "Turno"),
                t0() + Duration::hours(i),
            )
            .await
            .unwrap();
            kinds.push(checkin.kind);
        }

        assert_eq!(
            kinds,
            vec![
                CheckinType::In,
                CheckinType::Out,
                CheckinType::In,
                CheckinType::Out,
                CheckinType::In
            ]
        );
    }

    #[actix_web::test]
    async fn toggle_ignores_day_boundaries() {
        let (store, media, _dir, _site, user) = setup().await;

        let first = submit(&store, &media, BASE, user, form("1", "2", "a"), t0())
            .await
            .unwrap();
        let much_later = submit(
            &store,
            &media,
            BASE,
            user,
            form("1", "2", "b"),
            t0() + Duration::hours(30),
        )
        .await
        .unwrap();

        assert_eq!(first.kind, CheckinType::In);
        assert_eq!(much_later.kind, CheckinType::Out);
    }

    #[actix_web::test]
    async fn toggle_is_per_user() {
        let (store, media, _dir, site, ana) = setup().await;
        let beto = seed_user(&store, "beto", Some(site)).await;

        let a1 = submit(&store, &media, BASE, ana, form("1", "2", "x"), t0())
            .await
            .unwrap();
        let b1 = submit(
            &store,
            &media,
            BASE,
            beto,
            form("1", "2", "x"),
            t0() + Duration::minutes(1),
        )
        .await
        .unwrap();

        assert_eq!(a1.kind, CheckinType::In);
        assert_eq!(b1.kind, CheckinType::In);
    }

    #[actix_web::test]
    async fn created_record_carries_worksite_and_photo_url() {
        let (store, media, dir, site, user) = setup().await;

        let checkin = submit(
            &store,
            &media,
            BASE,
            user,
            form("-16.5", "-68.15", "Inventario"),
            t0(),
        )
        .await
        .unwrap();

        assert_eq!(checkin.work_site.id, site);
        assert_eq!(checkin.work_site.name, "Planta Central");
        assert_eq!(checkin.occurred_at, t0());
        assert_eq!(checkin.latitude, -16.5);
        assert!(checkin.photo_url.starts_with("http://localhost:4000/uploads/"));
        assert!(checkin.photo_url.ends_with("_selfie.jpg"));
        assert_eq!(stored_files(&dir), 1);
    }

    #[actix_web::test]
    async fn worksite_id_is_captured_but_names_are_read_live() {
        let (store, media, _dir, site, user) = setup().await;
        let other = seed_site(&store, "Almacen Sur").await;

        let before = submit(&store, &media, BASE, user, form("1", "2", "x"), t0())
            .await
            .unwrap();
        store
            .update_user(
                user,
                UserPatch {
                    work_site_id: Some(Some(other)),
                    full_name: Some("Carla Condori".into()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        let after = submit(
            &store,
            &media,
            BASE,
            user,
            form("1", "2", "y"),
            t0() + Duration::hours(1),
        )
        .await
        .unwrap();
        store.rename_work_site(site, "Planta Norte").await.unwrap();

        let mine = list_mine(&store, user).await.unwrap();
        assert_eq!(mine[1].id, before.id);
        assert_eq!(mine[1].work_site_id, site);
        assert_eq!(mine[1].work_site.name, "Planta Norte");
        assert_eq!(mine[1].user.full_name, "Carla Condori");
        assert_eq!(mine[0].id, after.id);
        assert_eq!(mine[0].work_site_id, other);
        assert_eq!(mine[0].work_site.name, "Almacen Sur");
    }

    #[actix_web::test]
    async fn late_stamped_submission_is_placed_after_the_latest() {
        let (store, media, _dir, _site, user) = setup().await;
        let later = t0() + Duration::milliseconds(50);

        // The submission stamped later reaches the store first.
        let a = submit(&store, &media, BASE, user, form("1", "2", "a"), later)
            .await
            .unwrap();
        let b = submit(&store, &media, BASE, user, form("1", "2", "b"), t0())
            .await
            .unwrap();

        assert_eq!(a.kind, CheckinType::In);
        assert_eq!(b.kind, CheckinType::Out);
        assert_eq!(b.occurred_at, later);

        let mut log = list_mine(&store, user).await.unwrap();
        log.reverse();
        let seen: Vec<_> = log.iter().map(|c| (c.activity.as_str(), c.kind)).collect();
        assert_eq!(seen, vec![("a", CheckinType::In), ("b", CheckinType::Out)]);
    }

    #[actix_web::test]
    async fn concurrent_submissions_keep_the_log_alternating() {
        let (store, media, _dir, _site, user) = setup().await;
        let stamps = [50, 0, 20, 10, 40, 30].map(|ms| t0() + Duration::milliseconds(ms));

        let results = join_all(
            stamps
                .iter()
                .map(|at| submit(&store, &media, BASE, user, form("1", "2", "x"), *at)),
        )
        .await;
        assert!(results.iter().all(Result::is_ok));

        let mut log = list_mine(&store, user).await.unwrap();
        log.reverse();
        assert_eq!(log.len(), stamps.len());
        assert_eq!(log[0].kind, CheckinType::In);
        assert!(log.windows(2).all(|w| w[0].kind != w[1].kind));
        assert!(log.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
    }

    #[actix_web::test]
    async fn recorded_time_has_millisecond_precision() {
        let (store, media, _dir, _site, user) = setup().await;
        let now = t0() + Duration::nanoseconds(1_234_567);

        let checkin = submit(&store, &media, BASE, user, form("1", "2", "x"), now)
            .await
            .unwrap();

        assert_eq!(checkin.occurred_at, t0() + Duration::milliseconds(1));
        let mine = list_mine(&store, user).await.unwrap();
        assert_eq!(mine[0].occurred_at, checkin.occurred_at);
    }

    #[actix_web::test]
    async fn user_without_worksite_is_blocked() {
        let (store, media, dir, _site, _user) = setup().await;
        let drifter = seed_user(&store, "sinlugar", None).await;

        let err = submit(&store, &media, BASE, drifter, form("1", "2", "x"), t0())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PreconditionFailed(_)));
        assert_eq!(store.checkin_count(), 0);
        assert_eq!(stored_files(&dir), 0);
    }

    #[actix_web::test]
    async fn missing_user_is_not_found() {
        let (store, media, _dir, _site, _user) = setup().await;

        let err = submit(&store, &media, BASE, 999, form("1", "2", "x"), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("user")));
    }

    #[actix_web::test]
    async fn invalid_fields_are_rejected_before_anything_is_stored() {
        let (store, media, dir, _site, user) = setup().await;

        let mut no_photo = form("1", "2", "x");
        no_photo.photo = None;
        let mut no_lat = form("1", "2", "x");
        no_lat.latitude = None;

        let cases = vec![
            form("abc", "2", "x"),
            form("NaN", "2", "x"),
            form("1", "inf", "x"),
            form("1", "2", "   "),
            no_photo,
            no_lat,
        ];

        for case in cases {
            let err = submit(&store, &media, BASE, user, case, t0()).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        }
        assert_eq!(store.checkin_count(), 0);
        assert_eq!(stored_files(&dir), 0);
    }

    #[actix_web::test]
    async fn oversized_photo_leaves_no_row_and_no_file() {
        let (store, media, dir, _site, user) = setup().await;

        let mut big = form("1", "2", "x");
        big.photo = Some(UploadedPhoto {
            original_name: "big.jpg".into(),
            bytes: vec![7u8; MAX_PHOTO_BYTES + 1],
        });

        let err = submit(&store, &media, BASE, user, big, t0()).await.unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge { .. }));
        assert_eq!(store.checkin_count(), 0);
        assert_eq!(stored_files(&dir), 0);
    }

    #[actix_web::test]
    async fn list_mine_is_newest_first_and_scoped() {
        let (store, media, _dir, site, user) = setup().await;
        let other = seed_user(&store, "otro", Some(site)).await;

        for i in 0..3 {
            submit(&store, &media, BASE, user, form("1", "2", "x"), t0() + Duration::hours(i))
                .await
                .unwrap();
        }
        submit(&store, &media, BASE, other, form("1", "2", "x"), t0()).await.unwrap();

        let mine = list_mine(&store, user).await.unwrap();
        assert_eq!(mine.len(), 3);
        assert!(mine.windows(2).all(|w| w[0].occurred_at > w[1].occurred_at));
        assert_eq!(mine[0].kind, CheckinType::In);
    }
}
