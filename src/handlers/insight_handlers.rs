use crate::error::AppError;
use crate::handlers::PageContext;
use crate::models::{ModelStats, Prediction, Severity};
use crate::services::{
    trend_service::TrendSeries, Metric, PredictionFilter, PredictionWindow, TrendTimeframe,
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

pub const CHART_WIDTH: f64 = 600.0;
pub const CHART_HEIGHT: f64 = 200.0;

const SEVERITY_OPTIONS: [Severity; 4] = [
    Severity::Critical,
    Severity::Warning,
    Severity::Info,
    Severity::Safe,
];

#[derive(Template, WebTemplate)]
#[template(path = "predictions.html")]
struct PredictionsTemplate {
    page: PageContext,
    predictions: Vec<Prediction>,
    stats: ModelStats,
    critical_alert: Option<Prediction>,
    severity: String,
    timeframe: PredictionWindow,
    severities: [Severity; 4],
    windows: [PredictionWindow; 4],
}

#[derive(Template, WebTemplate)]
#[template(path = "trends.html")]
struct TrendsTemplate {
    page: PageContext,
    series: TrendSeries,
    nodes: Vec<String>,
    metrics: [Metric; 4],
    timeframes: [TrendTimeframe; 4],
    selected_metric: String,
    polyline: String,
    chart_width: f64,
    chart_height: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionQuery {
    pub severity: Option<String>,
    pub timeframe: Option<String>,
}

impl PredictionQuery {
    pub fn filter(&self) -> PredictionFilter {
        PredictionFilter::from_query(self.severity.as_deref(), self.timeframe.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TrendQuery {
    pub node: Option<String>,
    pub metric: Option<String>,
    pub timeframe: Option<String>,
}

impl TrendQuery {
    pub fn metric(&self) -> &str {
        self.metric.as_deref().unwrap_or("vibration")
    }

    pub fn timeframe(&self) -> TrendTimeframe {
        self.timeframe
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }
}

/// GET /dashboard/predictions?severity&timeframe
pub async fn predictions_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PredictionQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "predictions").await?;
    let filter = query.filter();
    let now = Utc::now();

    Ok(PredictionsTemplate {
        page,
        predictions: state.prediction_service.list(&filter, now),
        stats: state.prediction_service.model_stats().clone(),
        critical_alert: state.prediction_service.critical_alert(now),
        severity: filter
            .severity
            .map_or_else(|| "all".to_string(), |s| s.as_str().to_string()),
        timeframe: filter.window,
        severities: SEVERITY_OPTIONS,
        windows: PredictionWindow::ALL,
    })
}

/// GET /dashboard/trends?node&metric&timeframe
pub async fn trends_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "trends").await?;
    let trends = &state.trend_service;

    let node = query
        .node
        .clone()
        .unwrap_or_else(|| trends.default_node().to_string());
    let series = trends.series(&node, query.metric(), query.timeframe());

    Ok(TrendsTemplate {
        page,
        polyline: series.polyline(CHART_WIDTH, CHART_HEIGHT),
        selected_metric: query.metric().to_lowercase(),
        series,
        nodes: trends.available_nodes().to_vec(),
        metrics: Metric::ALL,
        timeframes: TrendTimeframe::ALL,
        chart_width: CHART_WIDTH,
        chart_height: CHART_HEIGHT,
    })
}
