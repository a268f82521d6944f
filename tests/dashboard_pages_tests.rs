use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use rockfall_watch::{test_utils::test_helpers, AppState};
use tower::ServiceExt;

struct Client {
    app: Router,
    cookie: String,
}

impl Client {
    async fn get(&self, uri: &str) -> Response {
        self.app
            .clone()
            .oneshot(
                Request::get(uri)
                    .header(header::COOKIE, &self.cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn post_form(&self, uri: &str, body: &str, csrf_header: Option<&str>) -> Response {
        let mut request = Request::post(uri)
            .header(header::COOKIE, &self.cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = csrf_header {
            request = request.header("X-CSRF-Token", token);
        }
        self.app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Current form token, read from the page meta tag.
    async fn csrf_token(&self) -> String {
        let html = body_text(self.get("/dashboard").await).await;
        let marker = r#"<meta name="csrf-token" content=""#;
        let start = html.find(marker).unwrap() + marker.len();
        let end = html[start..].find('"').unwrap();
        html[start..start + end].to_string()
    }
}

fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(String::from)
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn setup() -> (Router, AppState) {
    let pool = test_helpers::create_test_db().await.unwrap();
    test_helpers::insert_test_user(&pool, "Site Lead", "lead@example.com", "secret1")
        .await
        .unwrap();
    let state = test_helpers::create_test_state(pool).await;
    let app = test_helpers::create_test_app(state.clone()).await.unwrap();
    (app, state)
}

async fn signed_in() -> (Client, AppState) {
    let (app, state) = setup().await;

    let page = app
        .clone()
        .oneshot(Request::get("/login").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let cookie = session_cookie(&page).unwrap();
    let html = body_text(page).await;
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).unwrap() + marker.len();
    let end = html[start..].find('"').unwrap();
    let token = &html[start..start + end];

    let response = app
        .clone()
        .oneshot(
            Request::post("/login")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "email=lead%40example.com&password=secret1&csrf_token={}",
                    token
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response).unwrap();

    (Client { app, cookie }, state)
}

#[tokio::test]
async fn test_dashboard_requires_login() {
    let (app, _) = setup().await;

    for uri in ["/dashboard", "/dashboard/events", "/dashboard/live-data/stream"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

#[tokio::test]
async fn test_signed_in_pages_render() {
    let (client, _) = signed_in().await;

    for uri in [
        "/dashboard",
        "/dashboard/map",
        "/dashboard/live-data",
        "/dashboard/predictions?severity=warning&timeframe=6h",
        "/dashboard/trends?node=Node-07&metric=temperature&timeframe=30d",
        "/dashboard/events",
        "/dashboard/health",
    ] {
        let response = client.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        let html = body_text(response).await;
        assert!(html.contains("Site Lead"), "{} should show the user", uri);
    }
}

#[tokio::test]
async fn test_guest_pages_redirect_when_signed_in() {
    let (client, _) = signed_in().await;

    let response = client.get("/login").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (client, _) = signed_in().await;

    let response = client.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = client.get("/dashboard").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_events_user_mode_hides_unverified() {
    let (client, _) = signed_in().await;

    let html = body_text(client.get("/dashboard/events").await).await;
    assert!(html.contains("Node-07"));
    assert!(!html.contains("Sensor triggered by equipment maintenance"));
}

#[tokio::test]
async fn test_training_mode_and_labels() {
    let (client, state) = signed_in().await;
    let token = client.csrf_token().await;

    // Labels cannot be edited outside training mode
    let response = client
        .post_form("/dashboard/events/3/labels", "labels=reviewed", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post_form(
            "/dashboard/events/mode",
            "mode=training&type=all&q=",
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/dashboard/events");

    let html = body_text(client.get("/dashboard/events").await).await;
    assert!(html.contains("Sensor triggered by equipment maintenance"));

    let response = client
        .post_form(
            "/dashboard/events/3/labels",
            "labels=Reviewed,%20maintenance,&type=False%20Positive",
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/dashboard/events?type=False+Positive&updated=3"
    );

    let event = state.event_service.find(3).await.unwrap();
    assert!(event.labels.contains("reviewed"));
    assert!(event.labels.contains("maintenance"));
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let (client, _) = signed_in().await;
    let token = client.csrf_token().await;

    client
        .post_form("/dashboard/events/mode", "mode=training", Some(&token))
        .await;
    let response = client
        .post_form("/dashboard/events/999/labels", "labels=x", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_csv_and_json() {
    let (client, _) = signed_in().await;

    let response = client
        .get("/dashboard/events/export?format=csv&type=Rockfall")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"rockfall-events.csv\""
    );
    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,occurred_at,node_id"));
    assert_eq!(lines.count(), 2);

    let response = client.get("/dashboard/events/export").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let events: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 3);

    let response = client.get("/dashboard/events/export?format=xml").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_live_toggle_returns_json_for_scripts() {
    let (client, state) = signed_in().await;
    let token = client.csrf_token().await;

    let response = client
        .post_form("/dashboard/live-data/toggle", "", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["live"], false);
    assert!(!state.simulator.is_live());

    let response = client
        .post_form("/dashboard/live-data/toggle", "live=true", Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.simulator.is_live());
}

#[tokio::test]
async fn test_not_found_and_security_headers() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(Request::get("/no/such/page").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(body_text(response).await.contains("/no/such/page"));

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
