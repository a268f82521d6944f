use crate::error::ApiError;
use crate::middleware::BearerToken;
use crate::models::PublicUser;
use crate::services::{
    auth_service::{AuthServiceError, LoginRequest},
    password_reset_service::PasswordResetError,
    user_service::{CreateUserRequest, UserServiceError},
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub token: String,
    pub user: PublicUser,
}

/// Unwraps a JSON body, turning malformed input into a `{"message"}` 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::EmailTaken => ApiError::Conflict,
            UserServiceError::InvalidName
            | UserServiceError::InvalidEmail
            | UserServiceError::WeakPassword
            | UserServiceError::PasswordMismatch => ApiError::BadRequest(err.to_string()),
            UserServiceError::UserNotFound => ApiError::NotFound("User".to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials | AuthServiceError::UserNotFound => {
                ApiError::InvalidCredentials
            }
            AuthServiceError::RepositoryError(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PasswordResetError> for ApiError {
    fn from(err: PasswordResetError) -> Self {
        match err {
            PasswordResetError::InvalidToken | PasswordResetError::TokenAlreadyUsed => {
                ApiError::BadRequest(err.to_string())
            }
            PasswordResetError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<crate::services::ApiTokenError> for ApiError {
    fn from(err: crate::services::ApiTokenError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// POST /api/auth/signup
pub async fn api_signup_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;

    let user = state
        .user_service
        .create_user(CreateUserRequest {
            name: request.name,
            email: request.email,
            password: request.password,
            password_confirm: request.confirm_password,
        })
        .await?;

    let token = state.api_token_service.issue(user.id).await?;

    if let Err(e) = state
        .email_service
        .send_welcome_email(&user.email, &user.name)
        .await
    {
        tracing::warn!("Failed to send welcome email to {}: {}", user.email, e);
    }

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: Some("User created successfully".to_string()),
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

/// POST /api/auth/login
pub async fn api_login_handler(
    State(state): State<AppState>,
    payload: Result<Json<ApiLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;

    let user = state
        .auth_service
        .authenticate(LoginRequest {
            email: request.email,
            password: request.password,
        })
        .await?;

    let token = state.api_token_service.issue(user.id).await?;
    tracing::info!("API token issued for user {}", user.id);

    Ok(Json(AuthResponse {
        message: None,
        token,
        user: PublicUser::from(&user),
    }))
}

/// POST /api/auth/forgot-password
pub async fn api_forgot_password_handler(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    if request.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }

    state
        .password_reset_service
        .request_reset(&request.email)
        .await?;

    Ok(Json(json!({
        "message": "If the email exists, a reset link has been sent"
    })))
}

/// POST /api/auth/reset-password
pub async fn api_reset_password_handler(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;

    state
        .password_reset_service
        .reset_password(&request.token, &request.password, &request.confirm_password)
        .await?;

    Ok(Json(json!({ "message": "Password has been reset" })))
}

/// POST /api/auth/logout - revokes the presented bearer token
pub async fn api_logout_handler(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<StatusCode, ApiError> {
    state.api_token_service.revoke(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
