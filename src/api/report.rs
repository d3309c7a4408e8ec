use actix_web::{
    HttpResponse,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use chrono::Utc;
use tracing::info;

use crate::{
    config::Config,
    error::AppError,
    model::checkin::CheckinResponse,
    service::report::{self, CheckinQuery, XLSX_CONTENT_TYPE},
    store::Store,
};

/// Filter check-ins across all users
#[utoipa::path(
    get,
    path = "/admin/checkins",
    params(CheckinQuery),
    responses(
        (status = 200, description = "Matching check-ins, newest first", body = Vec<CheckinResponse>),
        (status = 400, description = "Unparseable filter value"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn list_checkins(
    query: web::Query<CheckinQuery>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter(&config.timezone)?;
    let checkins = report::filter_checkins(store.get_ref(), &filter).await?;

    let body: Vec<CheckinResponse> = checkins
        .into_iter()
        .map(|c| CheckinResponse::new(c, &config.timezone))
        .collect();

    Ok(HttpResponse::Ok().json(body))
}

/// Download the filtered check-ins as an Excel workbook
#[utoipa::path(
    get,
    path = "/admin/checkins/export",
    params(CheckinQuery),
    responses(
        (status = 200, description = "Spreadsheet sent as an attachment named registros_<stamp>.xlsx"),
        (status = 400, description = "Unparseable filter value"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn export_checkins(
    query: web::Query<CheckinQuery>,
    store: web::Data<dyn Store>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let filter = query.into_inner().into_filter(&config.timezone)?;
    let doc =
        report::export_checkins(store.get_ref(), &filter, &config.timezone, Utc::now()).await?;

    info!(rows = doc.rows, file = %doc.file_name, "Export generated");

    Ok(HttpResponse::Ok()
        .content_type(XLSX_CONTENT_TYPE)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(doc.file_name)],
        })
        .body(doc.bytes))
}
