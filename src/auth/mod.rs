pub mod handlers;
pub mod middleware;

/// Session keys written at login.
pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_EMAIL: &str = "email";
pub const SESSION_NAME: &str = "name";
pub const SESSION_AUTH_TIMESTAMP: &str = "auth_timestamp";
