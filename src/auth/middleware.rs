use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::SESSION_USER_ID;

pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = session.get::<i64>(SESSION_USER_ID).await {
        next.run(request).await
    } else {
        tracing::debug!("Unauthenticated request to {}", request.uri().path());
        Redirect::to("/login").into_response()
    }
}

pub async fn redirect_if_authenticated(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_user_id)) = session.get::<i64>(SESSION_USER_ID).await {
        Redirect::to("/dashboard").into_response()
    } else {
        next.run(request).await
    }
}
