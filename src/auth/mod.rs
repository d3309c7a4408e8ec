pub mod auth;
pub mod authenticator;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
