pub mod db_utils;
pub mod seed_admin;
pub mod validation;
