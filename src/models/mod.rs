pub mod auth_token;
pub mod event;
pub mod prediction;
pub mod user;

pub use auth_token::{ApiToken, PasswordResetToken};
pub use event::{DatasetStats, RockfallEvent};
pub use prediction::{ModelStats, Prediction, Severity};
pub use user::{PublicUser, User};
