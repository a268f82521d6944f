pub mod api_token_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod email_service;
pub mod event_service;
pub mod health_service;
pub mod password_reset_service;
pub mod prediction_service;
pub mod trend_service;
pub mod user_service;

pub use api_token_service::{ApiTokenError, ApiTokenService, ValidatedToken};
pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use dashboard_service::{DashboardOverview, DashboardService};
pub use email_service::{create_email_service, EmailError, EmailService, MockEmailService};
pub use event_service::{EventFilter, EventService, EventServiceError, ExportFormat};
pub use health_service::{HealthReport, HealthService};
pub use password_reset_service::{PasswordResetError, PasswordResetService};
pub use prediction_service::{PredictionFilter, PredictionService, PredictionWindow};
pub use trend_service::{Metric, TrendSeries, TrendService, TrendTimeframe};
pub use user_service::{CreateUserRequest, UpdatePasswordRequest, UserService, UserServiceError};
