use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use rockfall_watch::{test_utils::test_helpers, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn setup() -> (Router, AppState) {
    let pool = test_helpers::create_test_db().await.unwrap();
    let state = test_helpers::create_test_state(pool).await;
    let app = test_helpers::create_test_app(state.clone()).await.unwrap();
    (app, state)
}

async fn post_json(app: &Router, uri: &str, body: Value, token: Option<&str>) -> Response {
    let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.clone()
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn signup(app: &Router, email: &str, password: &str) -> Response {
    post_json(
        app,
        "/api/auth/signup",
        json!({
            "name": "Field Engineer",
            "email": email,
            "password": password,
            "confirm_password": password,
        }),
        None,
    )
    .await
}

#[tokio::test]
async fn test_signup_returns_token_and_user() {
    let (app, _) = setup().await;

    let response = signup(&app, "Engineer@Example.com", "secret1").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["message"], "User created successfully");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["email"], "engineer@example.com");
    assert_eq!(body["user"]["name"], "Field Engineer");
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_signup_duplicate_email_conflicts() {
    let (app, _) = setup().await;

    assert_eq!(
        signup(&app, "dup@example.com", "secret1").await.status(),
        StatusCode::CREATED
    );

    let response = signup(&app, "DUP@example.com", "secret1").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["message"], "User already exists");
}

#[tokio::test]
async fn test_signup_validation_errors() {
    let (app, _) = setup().await;

    let response = signup(&app, "short@example.com", "12345").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "Password must be at least 6 characters"
    );

    let response = post_json(
        &app,
        "/api/auth/signup",
        json!({
            "name": "Mismatch",
            "email": "mismatch@example.com",
            "password": "secret1",
            "confirm_password": "secret2",
        }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], "Passwords do not match");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["message"].is_string());
}

#[tokio::test]
async fn test_login_and_logout() {
    let (app, _) = setup().await;
    signup(&app, "login@example.com", "secret1").await;

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "LOGIN@example.com", "password": "secret1" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["email"], "login@example.com");

    let response = post_json(&app, "/api/auth/logout", json!({}), Some(&token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The revoked token no longer opens protected routes
    let response = app
        .oneshot(
            Request::get("/api/telemetry/nodes")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let (app, _) = setup().await;
    signup(&app, "known@example.com", "secret1").await;

    for (email, password) in [
        ("known@example.com", "wrong-password"),
        ("unknown@example.com", "secret1"),
    ] {
        let response = post_json(
            &app,
            "/api/auth/login",
            json!({ "email": email, "password": password }),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["message"], "Invalid credentials");
    }
}

#[tokio::test]
async fn test_logout_requires_token() {
    let (app, _) = setup().await;

    let response = post_json(&app, "/api/auth/logout", json!({}), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["message"],
        "Missing authorization header"
    );
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let (app, _) = setup().await;
    signup(&app, "exists@example.com", "secret1").await;

    for email in ["exists@example.com", "missing@example.com"] {
        let response = post_json(
            &app,
            "/api/auth/forgot-password",
            json!({ "email": email }),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await["message"],
            "If the email exists, a reset link has been sent"
        );
    }

    let response = post_json(&app, "/api/auth/forgot-password", json!({ "email": " " }), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let (app, state) = setup().await;
    let body = json_body(signup(&app, "reset@example.com", "secret1").await).await;
    let user_id = body["user"]["id"].as_i64().unwrap();
    let old_api_token = body["token"].as_str().unwrap().to_string();

    let reset_token = state
        .password_reset_service
        .create_reset_token(user_id)
        .await
        .unwrap();

    let response = post_json(
        &app,
        "/api/auth/reset-password",
        json!({
            "token": reset_token,
            "password": "newsecret",
            "confirm_password": "newsecret",
        }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Password has been reset");

    // Old password and old API tokens stop working
    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "reset@example.com", "password": "secret1" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(&app, "/api/auth/logout", json!({}), Some(&old_api_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        &app,
        "/api/auth/login",
        json!({ "email": "reset@example.com", "password": "newsecret" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Tokens are single use
    let response = post_json(
        &app,
        "/api/auth/reset-password",
        json!({
            "token": reset_token,
            "password": "another1",
            "confirm_password": "another1",
        }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_password_rejects_unknown_token() {
    let (app, _) = setup().await;

    let response = post_json(
        &app,
        "/api/auth/reset-password",
        json!({
            "token": "does-not-exist",
            "password": "newsecret",
            "confirm_password": "newsecret",
        }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["message"],
        "Invalid or expired reset link"
    );
}
