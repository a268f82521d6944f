use crate::error::AppError;
use crate::handlers::{check_form_csrf, PageContext};
use crate::models::{DatasetStats, RockfallEvent};
use crate::services::event_service::{EventFilter, EventServiceError, ExportFormat, EVENT_TYPES};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session flag switching the events view between operator and
/// researcher mode.
pub const TRAINING_MODE_KEY: &str = "training_mode";

#[derive(Template, WebTemplate)]
#[template(path = "events.html")]
struct EventsTemplate {
    page: PageContext,
    events: Vec<RockfallEvent>,
    stats: DatasetStats,
    training_mode: bool,
    event_types: [&'static str; 3],
    selected_type: String,
    search: String,
    updated: Option<i64>,
    export_query: String,
}

/// Filter state carried in the events page URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventsQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

impl EventsQuery {
    fn cleaned(event_type: Option<String>, q: Option<String>) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            event_type: keep(event_type).filter(|t| !t.eq_ignore_ascii_case("all")),
            q: keep(q),
            updated: None,
        }
    }

    fn filter(&self, training_mode: bool) -> EventFilter {
        EventFilter {
            event_type: self.event_type.clone(),
            search: self.q.clone(),
            training_mode,
        }
    }

    /// URL of the events page with this filter applied.
    pub fn location(&self) -> String {
        match serde_urlencoded::to_string(self) {
            Ok(qs) if !qs.is_empty() => format!("/dashboard/events?{}", qs),
            _ => "/dashboard/events".to_string(),
        }
    }
}

async fn training_mode(session: &Session) -> Result<bool, AppError> {
    Ok(session.get::<bool>(TRAINING_MODE_KEY).await?.unwrap_or(false))
}

fn service_error(err: EventServiceError) -> AppError {
    match err {
        EventServiceError::NotFound => AppError::NotFound("Event".to_string()),
        EventServiceError::TrainingModeRequired => AppError::Forbidden(err.to_string()),
        other => {
            tracing::error!("Event request failed: {}", other);
            AppError::InternalError
        }
    }
}

/// GET /dashboard/events?type&q
pub async fn events_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageContext::load(&session, "events").await?;
    let training_mode = training_mode(&session).await?;
    let updated = query.updated;
    let query = EventsQuery::cleaned(query.event_type, query.q);

    let events = state
        .event_service
        .list(&query.filter(training_mode))
        .await
        .map_err(service_error)?;
    let stats = state
        .event_service
        .dataset_stats()
        .await
        .map_err(service_error)?;

    let export_query = serde_urlencoded::to_string(&query).unwrap_or_default();

    Ok(EventsTemplate {
        page,
        events,
        stats,
        training_mode,
        event_types: EVENT_TYPES,
        selected_type: query.event_type.clone().unwrap_or_else(|| "all".to_string()),
        search: query.q.clone().unwrap_or_default(),
        updated,
        export_query,
    })
}

#[derive(Deserialize)]
pub struct EventModeForm {
    csrf_token: Option<String>,
    mode: String,
    #[serde(rename = "type")]
    event_type: Option<String>,
    q: Option<String>,
}

/// POST /dashboard/events/mode
pub async fn event_mode_handler(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<EventModeForm>,
) -> Result<Response, AppError> {
    check_form_csrf(&session, &headers, form.csrf_token.as_deref()).await?;

    let training = match form.mode.as_str() {
        "training" => true,
        "user" => false,
        other => return Err(AppError::Validation(format!("Unknown mode: {}", other))),
    };
    session.insert(TRAINING_MODE_KEY, training).await?;
    tracing::debug!("Events view switched to {} mode", form.mode);

    let query = EventsQuery::cleaned(form.event_type, form.q);
    Ok(Redirect::to(&query.location()).into_response())
}

#[derive(Deserialize)]
pub struct LabelsForm {
    csrf_token: Option<String>,
    labels: String,
    #[serde(rename = "type")]
    event_type: Option<String>,
    q: Option<String>,
}

/// POST /dashboard/events/{id}/labels
pub async fn update_labels_handler(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<LabelsForm>,
) -> Result<Response, AppError> {
    check_form_csrf(&session, &headers, form.csrf_token.as_deref()).await?;
    let training_mode = training_mode(&session).await?;

    state
        .event_service
        .update_labels(id, &form.labels, training_mode)
        .await
        .map_err(service_error)?;

    let mut query = EventsQuery::cleaned(form.event_type, form.q);
    query.updated = Some(id);
    Ok(Redirect::to(&query.location()).into_response())
}

#[derive(Deserialize)]
pub struct ExportQuery {
    format: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    q: Option<String>,
}

/// GET /dashboard/events/export?format=json|csv
pub async fn export_events_handler(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format: ExportFormat = query
        .format
        .as_deref()
        .unwrap_or("json")
        .parse()
        .map_err(AppError::Validation)?;
    let training_mode = training_mode(&session).await?;
    let filter = EventsQuery::cleaned(query.event_type, query.q).filter(training_mode);

    let file = state
        .event_service
        .export(format, &filter)
        .await
        .map_err(service_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.body,
    )
        .into_response())
}
