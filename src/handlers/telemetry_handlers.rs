use std::convert::Infallible;
use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::{PredictionQuery, TrendQuery};
use crate::services::event_service::EventFilter;
use crate::telemetry::{
    FleetSnapshot, HealthStatus, NodeStatus, SensorNode, Simulator, WeatherStation,
};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};

/// A node together with its derived classifications.
#[derive(Debug, Serialize)]
pub struct NodeReading {
    #[serde(flatten)]
    pub node: SensorNode,
    pub status: NodeStatus,
    pub health: HealthStatus,
    pub signal_strength: &'static str,
}

impl From<SensorNode> for NodeReading {
    fn from(node: SensorNode) -> Self {
        Self {
            status: node.status(),
            health: node.health(),
            signal_strength: node.signal_strength(),
            node,
        }
    }
}

/// Payload of a `snapshot` event on the live stream.
#[derive(Debug, Serialize)]
pub struct LiveSnapshot {
    pub tick: u64,
    pub updated_at: DateTime<Utc>,
    pub nodes: Vec<NodeReading>,
    pub weather: WeatherStation,
}

impl From<&FleetSnapshot> for LiveSnapshot {
    fn from(fleet: &FleetSnapshot) -> Self {
        Self {
            tick: fleet.tick,
            updated_at: fleet.updated_at,
            nodes: fleet.nodes.iter().cloned().map(NodeReading::from).collect(),
            weather: fleet.weather.clone(),
        }
    }
}

fn snapshot_event(fleet: &FleetSnapshot) -> Option<Event> {
    match Event::default()
        .event("snapshot")
        .json_data(LiveSnapshot::from(fleet))
    {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!("Failed to encode snapshot event: {}", e);
            None
        }
    }
}

/// Fleet snapshots for a live subscriber: the current state first, then
/// every later tick exactly once.
pub async fn snapshot_updates(simulator: Simulator) -> impl Stream<Item = Arc<FleetSnapshot>> {
    // Subscribe before reading so no tick falls between the two
    let receiver = simulator.subscribe();
    let current = Arc::new(simulator.snapshot().await);
    let seen = current.tick;

    let updates = BroadcastStream::new(receiver).filter_map(move |update| match update {
        Ok(snapshot) if snapshot.tick > seen => Some(snapshot),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("Live subscriber lagged, {} snapshots skipped", skipped);
            None
        }
    });

    tokio_stream::once(current).chain(updates)
}

/// SSE stream of fleet snapshots, one `snapshot` event per tick.
pub async fn snapshot_stream(
    simulator: Simulator,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = snapshot_updates(simulator)
        .await
        .filter_map(|snapshot| snapshot_event(&snapshot))
        .map(Ok::<_, Infallible>);

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/telemetry/nodes
pub async fn list_nodes_handler(State(state): State<AppState>) -> Json<Vec<NodeReading>> {
    let fleet = state.simulator.snapshot().await;
    Json(fleet.nodes.into_iter().map(NodeReading::from).collect())
}

/// GET /api/telemetry/nodes/{id}
pub async fn get_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NodeReading>, ApiError> {
    let fleet = state.simulator.snapshot().await;
    fleet
        .node(&id)
        .cloned()
        .map(|node| Json(NodeReading::from(node)))
        .ok_or_else(|| ApiError::NotFound(format!("Node {}", id)))
}

/// GET /api/telemetry/weather
pub async fn weather_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.simulator.snapshot().await.weather)
}

/// GET /api/telemetry/overview
pub async fn overview_handler(State(state): State<AppState>) -> impl IntoResponse {
    let fleet = state.simulator.snapshot().await;
    Json(state.dashboard_service.overview(&fleet, Utc::now()))
}

/// GET /api/telemetry/predictions?severity&timeframe
pub async fn api_predictions_handler(
    State(state): State<AppState>,
    Query(query): Query<PredictionQuery>,
) -> impl IntoResponse {
    let now = Utc::now();
    let predictions = state.prediction_service.list(&query.filter(), now);

    Json(json!({
        "stats": state.prediction_service.model_stats(),
        "critical_alert": state.prediction_service.critical_alert(now),
        "predictions": predictions,
    }))
}

/// GET /api/telemetry/trends?node&metric&timeframe
pub async fn api_trends_handler(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> impl IntoResponse {
    let trends = &state.trend_service;
    let node = query
        .node
        .clone()
        .unwrap_or_else(|| trends.default_node().to_string());

    Json(trends.series(&node, query.metric(), query.timeframe()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiEventsQuery {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub training: bool,
}

/// GET /api/telemetry/events?type&q&training
pub async fn api_events_handler(
    State(state): State<AppState>,
    Query(query): Query<ApiEventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = EventFilter {
        event_type: query.event_type,
        search: query.q,
        training_mode: query.training,
    };

    let events = state
        .event_service
        .list(&filter)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let stats = state
        .event_service
        .dataset_stats()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({ "stats": stats, "events": events })))
}

/// GET /api/telemetry/health
pub async fn api_health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let fleet = state.simulator.snapshot().await;
    Json(state.health_service.report(&fleet, Utc::now()))
}

/// GET /api/telemetry/stream
pub async fn api_stream_handler(State(state): State<AppState>) -> impl IntoResponse {
    snapshot_stream(state.simulator).await
}

#[derive(Debug, Deserialize)]
pub struct LiveRequest {
    pub live: bool,
}

/// POST /api/telemetry/live {"live": bool}
pub async fn api_live_handler(
    State(state): State<AppState>,
    payload: Result<Json<LiveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    state.simulator.set_live(request.live);
    Ok(Json(json!({ "live": state.simulator.is_live() })))
}
