use crate::models::{DatasetStats, RockfallEvent};
use crate::repositories::event_repository::EventRepository;
use crate::repositories::user_repository::RepositoryError;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

pub const EVENT_TYPES: [&str; 3] = ["Rockfall", "Minor Slide", "False Positive"];

#[derive(Debug, thiserror::Error)]
pub enum EventServiceError {
    #[error("Event not found")]
    NotFound,
    #[error("Labels can only be edited in training mode")]
    TrainingModeRequired,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EventFilter {
    /// `None` or `"all"` keeps every type
    pub event_type: Option<String>,
    pub search: Option<String>,
    /// Researchers see every event; operators only verified ones
    #[serde(default)]
    pub training_mode: bool,
}

impl EventFilter {
    pub fn matches(&self, event: &RockfallEvent) -> bool {
        if !self.training_mode && !event.verified {
            return false;
        }

        if let Some(event_type) = self.event_type.as_deref().map(str::trim) {
            if !event_type.is_empty()
                && !event_type.eq_ignore_ascii_case("all")
                && !event.event_type.eq_ignore_ascii_case(event_type)
            {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                event.node_id.to_lowercase().contains(&term)
                    || event.location.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unsupported export format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

/// Normalizes free-form label input: trimmed, lower-cased, inner spaces
/// turned into underscores, duplicates and blanks dropped. Order of first
/// appearance is kept.
pub fn normalize_labels(raw: &str) -> String {
    let mut labels: Vec<String> = Vec::new();
    for label in raw.split(',') {
        let label = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels.join(",")
}

pub struct EventService {
    repository: Arc<dyn EventRepository>,
}

impl EventService {
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self { repository }
    }

    /// Events matching `filter`, newest first.
    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<RockfallEvent>, EventServiceError> {
        let events = self.repository.list_events().await?;
        Ok(events.into_iter().filter(|e| filter.matches(e)).collect())
    }

    pub async fn find(&self, id: i64) -> Result<RockfallEvent, EventServiceError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(EventServiceError::NotFound)
    }

    pub async fn dataset_stats(&self) -> Result<DatasetStats, EventServiceError> {
        Ok(self.repository.dataset_stats().await?)
    }

    pub async fn update_labels(
        &self,
        id: i64,
        raw_labels: &str,
        training_mode: bool,
    ) -> Result<RockfallEvent, EventServiceError> {
        if !training_mode {
            return Err(EventServiceError::TrainingModeRequired);
        }

        let labels = normalize_labels(raw_labels);
        match self.repository.update_labels(id, &labels).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => return Err(EventServiceError::NotFound),
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Updated labels of event {} to [{}]", id, labels);
        self.find(id).await
    }

    pub async fn export(
        &self,
        format: ExportFormat,
        filter: &EventFilter,
    ) -> Result<ExportFile, EventServiceError> {
        let events = self.list(filter).await?;

        let file = match format {
            ExportFormat::Json => ExportFile {
                content_type: "application/json",
                filename: "rockfall-events.json".to_string(),
                body: serde_json::to_string_pretty(&events)?,
            },
            ExportFormat::Csv => ExportFile {
                content_type: "text/csv; charset=utf-8",
                filename: "rockfall-events.csv".to_string(),
                body: events_to_csv(&events),
            },
        };

        Ok(file)
    }
}

const CSV_HEADER: &str = "id,occurred_at,node_id,event_type,magnitude,verified,confidence,\
description,location,weather_conditions,vibration,tilt,temperature,labels";

fn events_to_csv(events: &[RockfallEvent]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push_str("\r\n");
    for e in events {
        let row = [
            e.id.to_string(),
            csv_field(&e.occurred_at),
            csv_field(&e.node_id),
            csv_field(&e.event_type),
            csv_field(&e.magnitude),
            e.verified.to_string(),
            e.confidence.to_string(),
            csv_field(&e.description),
            csv_field(&e.location),
            csv_field(&e.weather_conditions),
            e.vibration.to_string(),
            e.tilt.to_string(),
            e.temperature.to_string(),
            csv_field(&e.labels),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
