use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const CSRF_TOKEN_KEY: &str = "csrf_token";
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const CSRF_TOKEN_MAX_AGE_SECS: i64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub created_at: i64,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() - self.created_at > CSRF_TOKEN_MAX_AGE_SECS
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

/// First characters of a token, for logs.
fn prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

pub async fn generate_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();
    session.insert(CSRF_TOKEN_KEY, token).await?;

    debug!("Generated new CSRF token: {}", prefix(&value));
    Ok(value)
}

pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await?;

    match token {
        Some(existing) if !existing.is_expired() => Ok(existing.value),
        _ => generate_csrf_token(session).await,
    }
}

async fn stored_token(session: &Session) -> Result<CsrfToken, AppError> {
    let token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await?;
    match token {
        Some(token) if !token.is_expired() => Ok(token),
        Some(_) => {
            warn!("CSRF token expired");
            Err(AppError::Forbidden("CSRF token expired".to_string()))
        }
        None => {
            warn!("No CSRF token in session");
            Err(AppError::Forbidden("Missing CSRF token".to_string()))
        }
    }
}

/// Checks the `csrf_token` field of a submitted form against the session
/// and rotates the token on success.
pub async fn validate_csrf_form_field(session: &Session, form_token: &str) -> Result<(), AppError> {
    let stored = stored_token(session).await?;

    if form_token != stored.value {
        warn!(
            "CSRF form token mismatch: expected {}, got {}",
            prefix(&stored.value),
            prefix(form_token)
        );
        return Err(AppError::Forbidden("Invalid CSRF token".to_string()));
    }

    generate_csrf_token(session).await?;
    Ok(())
}

/// Validates the `X-CSRF-Token` header on state-changing page requests.
/// Requests without the header fall through to the form-field check in
/// the handler; `/api` routes use bearer tokens instead.
pub async fn csrf_validation_middleware(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS)
        || request.uri().path().starts_with("/api/")
    {
        return Ok(next.run(request).await);
    }

    let Some(provided) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
    else {
        return Ok(next.run(request).await);
    };

    let stored = stored_token(&session)
        .await
        .map_err(|_| StatusCode::FORBIDDEN)?;

    if provided != stored.value {
        warn!(
            "CSRF header mismatch for {} {}",
            request.method(),
            request.uri().path()
        );
        return Err(StatusCode::FORBIDDEN);
    }

    // Header tokens stay valid for the lifetime of the page
    Ok(next.run(request).await)
}
