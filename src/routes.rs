use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    auth,
    config::SessionLayer,
    handlers,
    middleware::{add_security_headers, csrf_validation_middleware, require_api_token},
    AppState,
};

pub fn build_router(state: AppState, session_layer: SessionLayer) -> Router {
    let protected_routes = Router::new()
        .route("/dashboard", get(handlers::dashboard_handler))
        .route("/dashboard/map", get(handlers::map_handler))
        .route("/dashboard/live-data", get(handlers::live_data_handler))
        .route(
            "/dashboard/live-data/toggle",
            post(handlers::toggle_live_handler),
        )
        .route(
            "/dashboard/live-data/stream",
            get(handlers::live_stream_handler),
        )
        .route("/dashboard/predictions", get(handlers::predictions_handler))
        .route("/dashboard/trends", get(handlers::trends_handler))
        .route("/dashboard/events", get(handlers::events_handler))
        .route("/dashboard/events/mode", post(handlers::event_mode_handler))
        .route(
            "/dashboard/events/export",
            get(handlers::export_events_handler),
        )
        .route(
            "/dashboard/events/{id}/labels",
            post(handlers::update_labels_handler),
        )
        .route("/dashboard/health", get(handlers::health_handler))
        .layer(middleware::from_fn(auth::middleware::require_auth));

    let guest_routes = Router::new()
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route(
            "/signup",
            get(auth::handlers::signup_page).post(auth::handlers::signup_handler),
        )
        .layer(middleware::from_fn(
            auth::middleware::redirect_if_authenticated,
        ));

    let api_routes = api_router(state.clone());

    Router::new()
        .route("/", get(auth::handlers::index_handler))
        .merge(guest_routes)
        .route(
            "/forgot-password",
            get(auth::handlers::forgot_password_page)
                .post(auth::handlers::forgot_password_handler),
        )
        .route(
            "/reset-password/{token}",
            get(auth::handlers::reset_password_page).post(auth::handlers::reset_password_handler),
        )
        .route("/logout", get(auth::handlers::logout_handler))
        .route("/healthz", get(handlers::healthz_handler))
        .merge(protected_routes)
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("static"))
        .fallback(handlers::not_found_handler)
        // Layers
        .layer(middleware::from_fn(csrf_validation_middleware))
        .layer(session_layer)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/auth/logout", post(handlers::api_logout_handler))
        .route("/telemetry/nodes", get(handlers::list_nodes_handler))
        .route("/telemetry/nodes/{id}", get(handlers::get_node_handler))
        .route("/telemetry/weather", get(handlers::weather_handler))
        .route("/telemetry/overview", get(handlers::overview_handler))
        .route(
            "/telemetry/predictions",
            get(handlers::api_predictions_handler),
        )
        .route("/telemetry/trends", get(handlers::api_trends_handler))
        .route("/telemetry/events", get(handlers::api_events_handler))
        .route("/telemetry/health", get(handlers::api_health_handler))
        .route("/telemetry/stream", get(handlers::api_stream_handler))
        .route("/telemetry/live", post(handlers::api_live_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .route("/auth/signup", post(handlers::api_signup_handler))
        .route("/auth/login", post(handlers::api_login_handler))
        .route(
            "/auth/forgot-password",
            post(handlers::api_forgot_password_handler),
        )
        .route(
            "/auth/reset-password",
            post(handlers::api_reset_password_handler),
        )
        .merge(protected)
        .layer(cors_layer(state.config.cors_allowed_origin.as_deref()))
}

/// CORS policy for the JSON API. Without a configured origin any origin is
/// accepted.
fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let origin = match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(_)) => {
            tracing::warn!("CORS_ALLOWED_ORIGIN is not a valid header value; allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CACHE_CONTROL,
        ])
        .max_age(Duration::from_secs(3600))
}
