use crate::models::{ModelStats, Prediction, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How far back the prediction list reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionWindow {
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "6h")]
    LastSixHours,
    #[default]
    #[serde(rename = "24h")]
    LastDay,
    #[serde(rename = "7d")]
    LastWeek,
}

impl PredictionWindow {
    pub const ALL: [PredictionWindow; 4] = [
        PredictionWindow::LastHour,
        PredictionWindow::LastSixHours,
        PredictionWindow::LastDay,
        PredictionWindow::LastWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionWindow::LastHour => "1h",
            PredictionWindow::LastSixHours => "6h",
            PredictionWindow::LastDay => "24h",
            PredictionWindow::LastWeek => "7d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PredictionWindow::LastHour => "Last Hour",
            PredictionWindow::LastSixHours => "Last 6 Hours",
            PredictionWindow::LastDay => "Last 24 Hours",
            PredictionWindow::LastWeek => "Last 7 Days",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            PredictionWindow::LastHour => Duration::hours(1),
            PredictionWindow::LastSixHours => Duration::hours(6),
            PredictionWindow::LastDay => Duration::hours(24),
            PredictionWindow::LastWeek => Duration::days(7),
        }
    }
}

impl FromStr for PredictionWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PredictionWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe: {}", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionFilter {
    /// `None` shows every severity
    pub severity: Option<Severity>,
    pub window: PredictionWindow,
}

impl PredictionFilter {
    /// Builds a filter from raw query values. `all`, blanks and unknown
    /// values fall back to the defaults.
    pub fn from_query(severity: Option<&str>, timeframe: Option<&str>) -> Self {
        Self {
            severity: severity.and_then(|s| s.parse().ok()),
            window: timeframe.and_then(|t| t.parse().ok()).unwrap_or_default(),
        }
    }
}

struct CatalogEntry {
    id: i64,
    node_id: &'static str,
    age: Duration,
    risk_score: f64,
    alert_flag: bool,
    confidence: u8,
    summary: &'static str,
    factors: &'static [&'static str],
    location: &'static str,
    severity: Severity,
}

/// Serves the latest model output for the monitored slope.
pub struct PredictionService {
    catalog: Vec<CatalogEntry>,
    stats: ModelStats,
}

impl Default for PredictionService {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionService {
    pub fn new() -> Self {
        let catalog = vec![
            CatalogEntry {
                id: 1,
                node_id: "Node-07",
                age: Duration::minutes(15),
                risk_score: 0.89,
                alert_flag: true,
                confidence: 94,
                summary: "High probability of rockfall within 6 hours",
                factors: &["Vibration spike", "Weather conditions", "Historical pattern"],
                location: "Sector A-3",
                severity: Severity::Critical,
            },
            CatalogEntry {
                id: 2,
                node_id: "Node-12",
                age: Duration::minutes(45),
                risk_score: 0.67,
                alert_flag: true,
                confidence: 78,
                summary: "Elevated risk - monitor closely",
                factors: &["Gradual tilt increase", "Soil moisture"],
                location: "Sector B-1",
                severity: Severity::Warning,
            },
            CatalogEntry {
                id: 3,
                node_id: "Node-18",
                age: Duration::hours(2),
                risk_score: 0.43,
                alert_flag: false,
                confidence: 86,
                summary: "Moderate activity - normal range",
                factors: &["Stable readings", "No weather influence"],
                location: "Sector C-2",
                severity: Severity::Info,
            },
            CatalogEntry {
                id: 4,
                node_id: "Node-03",
                age: Duration::hours(3),
                risk_score: 0.21,
                alert_flag: false,
                confidence: 92,
                summary: "Low risk - stable conditions",
                factors: &["Consistent measurements", "Good weather"],
                location: "Sector A-1",
                severity: Severity::Safe,
            },
        ];

        let stats = ModelStats {
            total_predictions: 1247,
            accuracy: 94.2,
            last_training: "2 days ago".to_string(),
            model_version: "v2.3.1".to_string(),
            active_models: 3,
        };

        Self { catalog, stats }
    }

    /// Predictions matching `filter`, newest first.
    pub fn list(&self, filter: &PredictionFilter, now: DateTime<Utc>) -> Vec<Prediction> {
        let mut predictions: Vec<Prediction> = self
            .catalog
            .iter()
            .filter(|entry| filter.severity.map_or(true, |s| entry.severity == s))
            .filter(|entry| entry.age <= filter.window.duration())
            .map(|entry| materialize(entry, now))
            .collect();
        predictions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        predictions
    }

    pub fn model_stats(&self) -> &ModelStats {
        &self.stats
    }

    /// The newest flagged critical prediction, shown as a banner.
    pub fn critical_alert(&self, now: DateTime<Utc>) -> Option<Prediction> {
        self.catalog
            .iter()
            .filter(|entry| entry.alert_flag && entry.severity == Severity::Critical)
            .min_by_key(|entry| entry.age)
            .map(|entry| materialize(entry, now))
    }
}

fn materialize(entry: &CatalogEntry, now: DateTime<Utc>) -> Prediction {
    Prediction {
        id: entry.id,
        node_id: entry.node_id.to_string(),
        issued_at: now - entry.age,
        risk_score: entry.risk_score,
        alert_flag: entry.alert_flag,
        confidence: entry.confidence,
        summary: entry.summary.to_string(),
        factors: entry.factors.iter().map(|f| f.to_string()).collect(),
        location: entry.location.to_string(),
        severity: entry.severity,
    }
}
