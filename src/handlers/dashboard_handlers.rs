use crate::error::AppError;
use crate::handlers::{check_form_csrf, snapshot_stream, PageContext};
use crate::services::{health_service::HealthReport, DashboardOverview};
use crate::telemetry::{SensorNode, WeatherStation};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

pub const MAP_WIDTH: f64 = 800.0;
pub const MAP_HEIGHT: f64 = 500.0;
const MAP_PADDING: f64 = 60.0;

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    page: PageContext,
    overview: DashboardOverview,
    weather: WeatherStation,
}

#[derive(Template, WebTemplate)]
#[template(path = "map.html")]
struct MapTemplate {
    page: PageContext,
    markers: Vec<MapMarker>,
    width: f64,
    height: f64,
}

#[derive(Template, WebTemplate)]
#[template(path = "live_data.html")]
struct LiveDataTemplate {
    page: PageContext,
    nodes: Vec<SensorNode>,
    weather: WeatherStation,
    live: bool,
    last_update: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "health.html")]
struct HealthTemplate {
    page: PageContext,
    report: HealthReport,
}

/// A sensor placed on the site map.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub node: SensorNode,
    pub x: f64,
    pub y: f64,
}

/// Projects node coordinates onto a `width` x `height` canvas, north up.
/// A single node (or nodes sharing one coordinate) lands in the middle.
pub fn place_markers(nodes: &[SensorNode], width: f64, height: f64) -> Vec<MapMarker> {
    let bounds = |values: &mut dyn Iterator<Item = f64>| {
        values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (min_lat, max_lat) = bounds(&mut nodes.iter().map(|n| n.latitude));
    let (min_lon, max_lon) = bounds(&mut nodes.iter().map(|n| n.longitude));

    let scale = |value: f64, lo: f64, hi: f64, extent: f64| {
        if hi - lo > f64::EPSILON {
            MAP_PADDING + (value - lo) / (hi - lo) * (extent - 2.0 * MAP_PADDING)
        } else {
            extent / 2.0
        }
    };

    nodes
        .iter()
        .map(|node| MapMarker {
            node: node.clone(),
            x: scale(node.longitude, min_lon, max_lon, width),
            y: height - scale(node.latitude, min_lat, max_lat, height),
        })
        .collect()
}

/// GET /dashboard - fleet overview
pub async fn dashboard_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "dashboard").await?;
    let fleet = state.simulator.snapshot().await;
    let overview = state.dashboard_service.overview(&fleet, Utc::now());

    Ok(DashboardTemplate {
        page,
        overview,
        weather: fleet.weather,
    })
}

/// GET /dashboard/map
pub async fn map_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "map").await?;
    let fleet = state.simulator.snapshot().await;

    Ok(MapTemplate {
        page,
        markers: place_markers(&fleet.nodes, MAP_WIDTH, MAP_HEIGHT),
        width: MAP_WIDTH,
        height: MAP_HEIGHT,
    })
}

/// GET /dashboard/live-data
pub async fn live_data_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "live-data").await?;
    let fleet = state.simulator.snapshot().await;

    Ok(LiveDataTemplate {
        page,
        last_update: fleet.updated_at.format("%H:%M:%S UTC").to_string(),
        nodes: fleet.nodes,
        weather: fleet.weather,
        live: state.simulator.is_live(),
    })
}

#[derive(Deserialize)]
pub struct ToggleLiveForm {
    csrf_token: Option<String>,
    /// Explicit target state; the current state is flipped when absent
    live: Option<bool>,
}

/// POST /dashboard/live-data/toggle
///
/// Script callers (sending the CSRF header) get `{"live": bool}` back,
/// plain form posts are redirected to the live view.
pub async fn toggle_live_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<ToggleLiveForm>,
) -> Result<Response, AppError> {
    check_form_csrf(&session, &headers, form.csrf_token.as_deref()).await?;

    let live = form.live.unwrap_or(!state.simulator.is_live());
    state.simulator.set_live(live);

    if headers.contains_key(crate::middleware::CSRF_HEADER) {
        Ok(Json(json!({ "live": live })).into_response())
    } else {
        Ok(Redirect::to("/dashboard/live-data").into_response())
    }
}

/// GET /dashboard/live-data/stream - SSE feed for the live view
pub async fn live_stream_handler(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_stream(state.simulator).await
}

/// GET /dashboard/health
pub async fn health_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "health").await?;
    let fleet = state.simulator.snapshot().await;

    Ok(HealthTemplate {
        page,
        report: state.health_service.report(&fleet, Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Fleet;

    #[test]
    fn test_markers_stay_inside_the_canvas() {
        let fleet = Fleet::seed();
        let markers = place_markers(&fleet.nodes, MAP_WIDTH, MAP_HEIGHT);

        assert_eq!(markers.len(), fleet.nodes.len());
        for marker in &markers {
            assert!((MAP_PADDING..=MAP_WIDTH - MAP_PADDING).contains(&marker.x));
            assert!((MAP_PADDING..=MAP_HEIGHT - MAP_PADDING).contains(&marker.y));
        }
    }

    #[test]
    fn test_northern_node_is_drawn_higher() {
        let fleet = Fleet::seed();
        let mut nodes = fleet.nodes.clone();
        nodes.truncate(2);
        nodes[0].latitude = 47.0;
        nodes[1].latitude = 48.0;

        let markers = place_markers(&nodes, MAP_WIDTH, MAP_HEIGHT);
        assert!(markers[1].y < markers[0].y);
    }

    #[test]
    fn test_single_node_is_centered() {
        let fleet = Fleet::seed();
        let markers = place_markers(&fleet.nodes[..1], MAP_WIDTH, MAP_HEIGHT);
        assert_eq!(markers[0].x, MAP_WIDTH / 2.0);
        assert_eq!(markers[0].y, MAP_HEIGHT / 2.0);
    }
}
