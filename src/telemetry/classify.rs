//! Threshold rules that turn raw readings into display states.

use serde::{Deserialize, Serialize};

/// Vibration (µg) at or above which a node is critical.
pub const VIBRATION_CRITICAL: f64 = 150.0;
/// Vibration (µg) at or above which a node is in warning.
pub const VIBRATION_WARNING: f64 = 60.0;
/// Tilt (degrees) at or above which a node is critical.
pub const TILT_CRITICAL: f64 = 12.0;
/// Tilt (degrees) at or above which a node is in warning.
pub const TILT_WARNING: f64 = 6.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    // Ordered most severe first so sorting puts critical nodes on top
    Critical,
    Warning,
    Safe,
    Offline,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Critical => "critical",
            NodeStatus::Warning => "warning",
            NodeStatus::Safe => "safe",
            NodeStatus::Offline => "offline",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeStatus::Critical => "Critical",
            NodeStatus::Warning => "Warning",
            NodeStatus::Safe => "Normal",
            NodeStatus::Offline => "Offline",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            NodeStatus::Critical => "status-critical",
            NodeStatus::Warning => "status-warning",
            NodeStatus::Safe => "status-safe",
            NodeStatus::Offline => "status-offline",
        }
    }

    /// Marker fill used on the site map.
    pub fn marker_color(&self) -> &'static str {
        match self {
            NodeStatus::Safe => "#10b981",
            NodeStatus::Warning => "#f59e0b",
            NodeStatus::Critical => "#ef4444",
            NodeStatus::Offline => "#6b7280",
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, NodeStatus::Critical | NodeStatus::Warning)
    }
}

pub fn node_status(online: bool, vibration: f64, tilt: f64) -> NodeStatus {
    if !online {
        NodeStatus::Offline
    } else if vibration >= VIBRATION_CRITICAL || tilt >= TILT_CRITICAL {
        NodeStatus::Critical
    } else if vibration >= VIBRATION_WARNING || tilt >= TILT_WARNING {
        NodeStatus::Warning
    } else {
        NodeStatus::Safe
    }
}

/// Text colour class for a battery percentage; `None` means the node is
/// not reporting.
pub fn battery_level(battery: Option<f64>) -> &'static str {
    match battery {
        None => "text-status-offline",
        Some(b) if b > 50.0 => "text-status-safe",
        Some(b) if b > 20.0 => "text-status-warning",
        Some(_) => "text-status-critical",
    }
}

pub fn signal_strength(rssi: Option<i32>) -> &'static str {
    match rssi {
        None => "Offline",
        Some(r) if r > -60 => "Excellent",
        Some(r) if r > -70 => "Good",
        Some(r) if r > -80 => "Fair",
        Some(_) => "Poor",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Critical,
    Warning,
    Elevated,
    Low,
}

impl RiskLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "text-status-critical",
            RiskLevel::Warning => "text-status-warning",
            RiskLevel::Elevated => "text-chart-primary",
            RiskLevel::Low => "text-status-safe",
        }
    }
}

pub fn risk_level(score: f64) -> RiskLevel {
    if score >= 0.8 {
        RiskLevel::Critical
    } else if score >= 0.6 {
        RiskLevel::Warning
    } else if score >= 0.4 {
        RiskLevel::Elevated
    } else {
        RiskLevel::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Offline,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Offline => "offline",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "status-safe",
            HealthStatus::Warning => "status-warning",
            HealthStatus::Critical => "status-critical",
            HealthStatus::Offline => "status-offline",
        }
    }
}

pub fn node_health(
    online: bool,
    battery: f64,
    rssi: Option<i32>,
    data_quality: f64,
    has_issues: bool,
) -> HealthStatus {
    if !online {
        return HealthStatus::Offline;
    }
    if battery <= 35.0 || data_quality < 75.0 {
        return HealthStatus::Critical;
    }
    if battery < 70.0 || rssi.map_or(true, |r| r <= -72) || has_issues {
        return HealthStatus::Warning;
    }
    HealthStatus::Healthy
}
