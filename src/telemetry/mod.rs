//! Simulated sensor network: node model, threshold rules and the
//! random-walk driver behind the live views.

pub mod classify;
pub mod fleet;
pub mod simulator;

pub use classify::{HealthStatus, NodeStatus, RiskLevel};
pub use fleet::{Fleet, FleetSnapshot, SensorNode, StatusCounts, WeatherStation};
pub use simulator::Simulator;

use chrono::{DateTime, Utc};

/// Renders the age of a timestamp the way the views show it ("now",
/// "2 min ago", "3 hours ago", "4 days ago").
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    match seconds {
        0..=59 => "now".to_string(),
        60..=3_599 => format!("{} min ago", seconds / 60),
        3_600..=86_399 => plural(seconds / 3_600, "hour"),
        _ => plural(seconds / 86_400, "day"),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
