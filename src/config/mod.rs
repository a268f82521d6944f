pub mod app;
pub mod session;

pub use app::{AppConfig, ConfigError};
pub use session::{validate_production_config, SessionConfig, SessionLayer};
