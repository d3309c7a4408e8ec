use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::checkin::CheckinResponse,
    service::{
        checkin::{self, CheckinSubmission, UploadedPhoto},
        media::{MAX_PHOTO_BYTES, MediaStore, public_base},
    },
    store::Store,
};
use actix_multipart::{Field, Multipart};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use futures_util::TryStreamExt;
use utoipa::ToSchema;

/// Cap for the plain text parts of the form.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Buffers one part, bailing out as soon as it grows past `limit`.
async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if buf.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

async fn read_text(field: &mut Field, name: &str) -> Result<String, AppError> {
    let bytes = read_field(field, MAX_TEXT_FIELD_BYTES).await?;
    String::from_utf8(bytes).map_err(|_| AppError::Validation(format!("{name} must be UTF-8 text")))
}

/// Shape of the `multipart/form-data` body, for the API docs only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct CheckinForm {
    /// The photo file
    #[schema(value_type = String, format = Binary)]
    photo: Vec<u8>,
    #[schema(example = -16.5)]
    latitude: f64,
    #[schema(example = -68.15)]
    longitude: f64,
    #[schema(example = "Inventario")]
    activity: String,
}

/// Collects the check-in form. Unknown parts are read and ignored.
pub async fn read_submission(
    mut payload: Multipart,
    photo_limit: usize,
) -> Result<CheckinSubmission, AppError> {
    let mut submission = CheckinSubmission::default();

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().map(str::to_string);

        match name.as_str() {
            "photo" => {
                let bytes = read_field(&mut field, photo_limit).await?;
                submission.photo = Some(UploadedPhoto {
                    original_name: file_name.unwrap_or_default(),
                    bytes,
                });
            }
            "latitude" => submission.latitude = Some(read_text(&mut field, "latitude").await?),
            "longitude" => submission.longitude = Some(read_text(&mut field, "longitude").await?),
            "activity" => submission.activity = Some(read_text(&mut field, "activity").await?),
            _ => {
                read_field(&mut field, MAX_TEXT_FIELD_BYTES).await?;
            }
        }
    }

    Ok(submission)
}

/// Submit a geotagged photo check-in
///
/// The type (IN or OUT) is decided by the server from the caller's previous
/// check-in.
#[utoipa::path(
    post,
    path = "/checkins",
    request_body(content = CheckinForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Check-in recorded", body = CheckinResponse),
        (status = 400, description = "Invalid form or no assigned worksite"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account no longer exists"),
        (status = 413, description = "Photo exceeds 10 MiB"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Checkins"
)]
pub async fn submit_checkin(
    req: HttpRequest,
    auth: AuthUser,
    payload: Multipart,
    store: web::Data<dyn Store>,
    media: web::Data<MediaStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let photo_base = {
        let conn = req.connection_info();
        public_base(config.upload_base_url.as_deref(), conn.scheme(), conn.host())
    };

    let submission = read_submission(payload, MAX_PHOTO_BYTES).await?;

    let recorded = checkin::submit(
        store.get_ref(),
        media.get_ref(),
        &photo_base,
        auth.user_id,
        submission,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Created().json(CheckinResponse::new(recorded, &config.timezone)))
}

/// The caller's own check-ins, newest first
#[utoipa::path(
    get,
    path = "/checkins/me",
    responses(
        (status = 200, description = "Own check-ins", body = Vec<CheckinResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Checkins"
)]
pub async fn my_checkins(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let checkins = checkin::list_mine(store.get_ref(), auth.user_id).await?;

    let body: Vec<CheckinResponse> = checkins
        .into_iter()
        .map(|c| CheckinResponse::new(c, &config.timezone))
        .collect();

    Ok(HttpResponse::Ok().json(body))
}
