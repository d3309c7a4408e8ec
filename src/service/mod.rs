pub mod checkin;
pub mod directory;
pub mod media;
pub mod report;
