pub mod checkin;
pub mod health;
pub mod report;
pub mod user;
pub mod work_site;
