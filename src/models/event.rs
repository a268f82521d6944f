use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A recorded slope event, as kept in the research dataset.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RockfallEvent {
    pub id: i64,
    pub occurred_at: String,
    pub node_id: String,
    pub event_type: String,
    pub magnitude: String,
    pub verified: bool,
    pub confidence: i64,
    pub description: String,
    pub location: String,
    pub weather_conditions: String,
    pub vibration: f64,
    pub tilt: f64,
    pub temperature: f64,
    /// Comma-separated label list
    pub labels: String,
}

impl RockfallEvent {
    pub fn label_list(&self) -> Vec<&str> {
        self.labels
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label_list().contains(&label)
    }

    pub fn is_false_positive(&self) -> bool {
        self.event_type == "False Positive" || self.has_label("false_positive")
    }

    pub fn magnitude_class(&self) -> &'static str {
        match self.magnitude.as_str() {
            "Large" => "status-critical",
            "Medium" => "status-warning",
            "Small" => "bg-chart-primary",
            _ => "bg-muted",
        }
    }

    pub fn event_type_class(&self) -> &'static str {
        match self.event_type.as_str() {
            "Rockfall" => "status-critical",
            "Minor Slide" => "status-warning",
            "False Positive" => "bg-muted",
            _ => "bg-chart-primary",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatasetStats {
    pub total_events: i64,
    pub validated_events: i64,
    pub training_events: i64,
    pub false_positives: i64,
}
