use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::telemetry::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Safe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Safe => "safe",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Critical => "status-critical",
            Severity::Warning => "status-warning",
            Severity::Safe => "status-safe",
            Severity::Info => "bg-muted",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            "safe" => Ok(Severity::Safe),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub node_id: String,
    pub issued_at: DateTime<Utc>,
    pub risk_score: f64,
    pub alert_flag: bool,
    pub confidence: u8,
    pub summary: String,
    pub factors: Vec<String>,
    pub location: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub total_predictions: u32,
    pub accuracy: f64,
    pub last_training: String,
    pub model_version: String,
    pub active_models: u32,
}

impl Prediction {
    pub fn risk_level(&self) -> RiskLevel {
        crate::telemetry::classify::risk_level(self.risk_score)
    }

    pub fn risk_percent(&self) -> u8 {
        (self.risk_score * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parsing() {
        assert_eq!("Critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert!("all".parse::<Severity>().is_err());
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
