pub mod checkin;
pub mod role;
pub mod user;
pub mod work_site;
