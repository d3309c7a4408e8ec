use crate::model::{
    checkin::{CheckinResponse, CheckinType, CheckinUser},
    role::Role,
    user::UserProfile,
    work_site::WorkSite,
};
use crate::api::checkin::CheckinForm;
use crate::models::{LoginReqDto, LoginResponse};
use crate::service::directory::{CreateUser, UpdateUser, WorkSiteReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Check-in Tracker API",
        version = "1.0.0",
        description = r#"
## Geotagged photo attendance

Employees sign in and record check-ins: a photo, GPS coordinates and a short
activity note. The server decides whether each check-in is an entry (IN) or
an exit (OUT) by alternating from the employee's previous record.

### Security
Every endpoint except login and health requires a **JWT Bearer** token.
`/admin/*` additionally requires the ADMIN role.

### Reports
Admins can filter check-ins by employee, type and time range, and download
the same selection as an Excel workbook.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::me,

        crate::api::checkin::submit_checkin,
        crate::api::checkin::my_checkins,

        crate::api::work_site::create_work_site,
        crate::api::work_site::list_work_sites,
        crate::api::work_site::get_work_site,
        crate::api::work_site::update_work_site,
        crate::api::work_site::delete_work_site,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::get_user,
        crate::api::user::update_user,
        crate::api::user::delete_user,

        crate::api::report::list_checkins,
        crate::api::report::export_checkins,

        crate::api::health::health
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            UserProfile,
            Role,
            WorkSite,
            WorkSiteReq,
            CreateUser,
            UpdateUser,
            CheckinType,
            CheckinUser,
            CheckinForm,
            CheckinResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and current user"),
        (name = "Checkins", description = "Employee check-in submission and history"),
        (name = "Worksites", description = "Worksite administration"),
        (name = "Users", description = "User administration"),
        (name = "Reports", description = "Check-in filtering and Excel export"),
        (name = "Health", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the handlers refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
