use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::{
    auth_service::{AuthServiceError, LoginRequest},
    password_reset_service::PasswordResetError,
    user_service::{CreateUserRequest, UserServiceError},
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::{SESSION_AUTH_TIMESTAMP, SESSION_EMAIL, SESSION_NAME, SESSION_USER_ID};

const INVALID_CSRF_MESSAGE: &str = "Invalid security token. Please refresh the page and try again.";

#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    error: Option<String>,
    notice: Option<String>,
    email: String,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
struct SignupTemplate {
    error: Option<String>,
    name: String,
    email: String,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
struct ForgotPasswordTemplate {
    error: Option<String>,
    sent: bool,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    error: Option<String>,
    token: String,
    token_valid: bool,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    remember_me: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    name: String,
    email: String,
    password: String,
    password_confirm: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    password: String,
    password_confirm: String,
    csrf_token: String,
}

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    signup: Option<String>,
    reset: Option<String>,
}

async fn csrf_token(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|_| String::from("error"))
}

/// GET / - the login form, or the dashboard for a signed-in user
pub async fn index_handler(session: Session) -> Response {
    if let Ok(Some(_user_id)) = session.get::<i64>(SESSION_USER_ID).await {
        return Redirect::to("/dashboard").into_response();
    }
    login_page(session, Query(LoginQuery::default())).await
}

pub async fn login_page(session: Session, Query(query): Query<LoginQuery>) -> Response {
    let notice = if query.signup.as_deref() == Some("success") {
        Some("Account created. Please sign in.".to_string())
    } else if query.reset.as_deref() == Some("success") {
        Some("Your password has been updated. Please sign in.".to_string())
    } else {
        None
    };

    LoginTemplate {
        error: None,
        notice,
        email: String::new(),
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

async fn login_error(msg: &str, email: &str, session: &Session) -> Response {
    let template = LoginTemplate {
        error: Some(msg.to_string()),
        notice: None,
        email: email.to_string(),
        csrf_token: csrf_token(session).await,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| format!("<html><body><h1>Error: {}</h1></body></html>", msg)),
    )
    .into_response()
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return login_error(INVALID_CSRF_MESSAGE, &form.email, &session).await;
    }

    let request = LoginRequest {
        email: form.email.clone(),
        password: form.password.clone(),
    };

    match app_state.auth_service.authenticate(request).await {
        Ok(user) => {
            // New session id on privilege change
            if session.cycle_id().await.is_err()
                || session.insert(SESSION_USER_ID, user.id).await.is_err()
                || session.insert(SESSION_EMAIL, &user.email).await.is_err()
                || session.insert(SESSION_NAME, &user.name).await.is_err()
                || session
                    .insert(SESSION_AUTH_TIMESTAMP, chrono::Utc::now().timestamp())
                    .await
                    .is_err()
            {
                return login_error("Failed to create session", &form.email, &session).await;
            }

            if form.remember_me.is_some() {
                session.set_expiry(Some(tower_sessions::Expiry::OnInactivity(
                    time::Duration::days(30),
                )));
            }

            tracing::info!("User {} signed in", user.id);
            Redirect::to("/dashboard").into_response()
        }
        Err(err) => {
            let error_msg = match err {
                AuthServiceError::InvalidCredentials | AuthServiceError::UserNotFound => {
                    "Invalid email or password"
                }
                AuthServiceError::RepositoryError(e) => {
                    tracing::error!("Login failed: {}", e);
                    "An error occurred. Please try again."
                }
            };
            login_error(error_msg, &form.email, &session).await
        }
    }
}

pub async fn signup_page(session: Session) -> Response {
    SignupTemplate {
        error: None,
        name: String::new(),
        email: String::new(),
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

async fn signup_error(msg: &str, form: &SignupForm, session: &Session) -> Response {
    SignupTemplate {
        error: Some(msg.to_string()),
        name: form.name.clone(),
        email: form.email.clone(),
        csrf_token: csrf_token(session).await,
    }
    .into_response()
}

pub async fn signup_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return signup_error(INVALID_CSRF_MESSAGE, &form, &session).await;
    }

    let request = CreateUserRequest {
        name: form.name.clone(),
        email: form.email.clone(),
        password: form.password.clone(),
        password_confirm: Some(form.password_confirm.clone()),
    };

    match app_state.user_service.create_user(request).await {
        Ok(user) => {
            if let Err(e) = app_state
                .email_service
                .send_welcome_email(&user.email, &user.name)
                .await
            {
                tracing::warn!("Failed to send welcome email to {}: {}", user.email, e);
            }
            Redirect::to("/login?signup=success").into_response()
        }
        Err(err) => {
            let error_msg = match err {
                UserServiceError::InvalidName
                | UserServiceError::InvalidEmail
                | UserServiceError::WeakPassword
                | UserServiceError::PasswordMismatch => err.to_string(),
                UserServiceError::EmailTaken => "Email already registered".to_string(),
                other => {
                    tracing::error!("Signup failed: {}", other);
                    "Registration failed. Please try again.".to_string()
                }
            };
            signup_error(&error_msg, &form, &session).await
        }
    }
}

pub async fn forgot_password_page(session: Session) -> Response {
    ForgotPasswordTemplate {
        error: None,
        sent: false,
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

pub async fn forgot_password_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return ForgotPasswordTemplate {
            error: Some(INVALID_CSRF_MESSAGE.to_string()),
            sent: false,
            csrf_token: csrf_token(&session).await,
        }
        .into_response();
    }

    if let Err(e) = app_state
        .password_reset_service
        .request_reset(&form.email)
        .await
    {
        tracing::error!("Password reset request failed: {}", e);
    }

    // Same answer whether or not the account exists
    ForgotPasswordTemplate {
        error: None,
        sent: true,
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

pub async fn reset_password_page(
    State(app_state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    let (token_valid, error) = match app_state.password_reset_service.verify_token(&token).await {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    ResetPasswordTemplate {
        error,
        token,
        token_valid,
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

pub async fn reset_password_handler(
    State(app_state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return ResetPasswordTemplate {
            error: Some(INVALID_CSRF_MESSAGE.to_string()),
            token,
            token_valid: true,
            csrf_token: csrf_token(&session).await,
        }
        .into_response();
    }

    let result = app_state
        .password_reset_service
        .reset_password(&token, &form.password, &form.password_confirm)
        .await;

    let (token_valid, error_msg) = match result {
        Ok(()) => return Redirect::to("/login?reset=success").into_response(),
        Err(e @ (PasswordResetError::InvalidToken | PasswordResetError::TokenAlreadyUsed)) => {
            (false, e.to_string())
        }
        Err(PasswordResetError::Validation(msg)) => (true, msg),
        Err(e) => {
            tracing::error!("Password reset failed: {}", e);
            (true, "An error occurred. Please try again.".to_string())
        }
    };

    ResetPasswordTemplate {
        error: Some(error_msg),
        token,
        token_valid,
        csrf_token: csrf_token(&session).await,
    }
    .into_response()
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    let _ = session.flush().await;
    Redirect::to("/")
}
