pub mod api_auth_handlers;
pub mod dashboard_handlers;
pub mod event_handlers;
pub mod insight_handlers;
pub mod telemetry_handlers;

pub use api_auth_handlers::*;
pub use dashboard_handlers::*;
pub use event_handlers::*;
pub use insight_handlers::*;
pub use telemetry_handlers::*;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{
    auth::{SESSION_EMAIL, SESSION_NAME},
    error::AppError,
    middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field, CSRF_HEADER},
};

/// Values every dashboard page shares with the base layout.
pub struct PageContext {
    pub user_name: String,
    pub user_email: String,
    pub csrf_token: String,
    /// Navigation entry to highlight
    pub active: &'static str,
}

impl PageContext {
    pub async fn load(session: &Session, active: &'static str) -> Result<Self, AppError> {
        let user_email = session
            .get::<String>(SESSION_EMAIL)
            .await?
            .unwrap_or_else(|| "Unknown".to_string());
        let user_name = session
            .get::<String>(SESSION_NAME)
            .await?
            .unwrap_or_else(|| user_email.clone());

        Ok(Self {
            user_name,
            user_email,
            csrf_token: get_or_create_csrf_token(session).await?,
            active,
        })
    }
}

/// Form posts from the dashboard either carry the `X-CSRF-Token` header
/// (already checked by the CSRF middleware) or a `csrf_token` form field.
pub async fn check_form_csrf(
    session: &Session,
    headers: &HeaderMap,
    form_token: Option<&str>,
) -> Result<(), AppError> {
    if headers.contains_key(CSRF_HEADER) {
        return Ok(());
    }
    match form_token {
        Some(token) => validate_csrf_form_field(session, token).await,
        None => Err(AppError::Forbidden("Missing CSRF token".to_string())),
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {
    path: String,
}

pub async fn not_found_handler(uri: Uri) -> Response {
    tracing::debug!("No route for {}", uri.path());
    (
        StatusCode::NOT_FOUND,
        NotFoundTemplate {
            path: uri.path().to_string(),
        },
    )
        .into_response()
}

/// GET /healthz - liveness probe
pub async fn healthz_handler() -> &'static str {
    "ok"
}
