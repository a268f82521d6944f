use crate::telemetry::{time_ago, FleetSnapshot, NodeStatus, SensorNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default)]
pub struct DashboardService;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardMetrics {
    pub active_sensors: usize,
    pub total_sensors: usize,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
    pub last_rainfall: String,
    pub battery_health: Option<u8>,
    pub network_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertSummary {
    pub node_id: String,
    pub location: String,
    pub kind: String,
    pub severity: NodeStatus,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkStatusRow {
    pub node_id: String,
    pub vibration: f64,
    pub tilt: f64,
    pub battery: f64,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardOverview {
    pub metrics: DashboardMetrics,
    pub alerts: Vec<AlertSummary>,
    pub network: Vec<NetworkStatusRow>,
    pub critical_banner: Option<String>,
    pub last_update: String,
}

impl DashboardService {
    pub fn new() -> Self {
        Self
    }

    pub fn overview(&self, fleet: &FleetSnapshot, now: DateTime<Utc>) -> DashboardOverview {
        let counts = fleet.status_counts();

        let metrics = DashboardMetrics {
            active_sensors: counts.online(),
            total_sensors: fleet.nodes.len(),
            active_alerts: counts.alerts(),
            critical_alerts: counts.critical,
            warning_alerts: counts.warning,
            last_rainfall: format!(
                "{:.1}mm ({})",
                fleet.weather.last_rainfall_amount,
                time_ago(fleet.weather.last_rainfall_at, now)
            ),
            battery_health: fleet.average_battery(),
            network_status: network_status(counts.online(), fleet.nodes.len()).to_string(),
        };

        let mut alerts: Vec<AlertSummary> = fleet
            .nodes
            .iter()
            .filter_map(|node| alert_for(node, now))
            .collect();
        alerts.sort_by_key(|alert| alert.severity);

        let mut network: Vec<NetworkStatusRow> = fleet
            .nodes
            .iter()
            .filter(|node| node.online)
            .map(|node| NetworkStatusRow {
                node_id: node.id.clone(),
                vibration: node.vibration,
                tilt: node.tilt,
                battery: node.battery,
                status: node.status(),
            })
            .collect();
        network.sort_by_key(|row| row.status);

        let critical_banner = fleet
            .nodes
            .iter()
            .find(|node| node.status() == NodeStatus::Critical)
            .map(|node| {
                format!(
                    "{} detected at {}. Immediate attention required.",
                    node.alert_kind().unwrap_or("Critical reading"),
                    node.id
                )
            });

        DashboardOverview {
            metrics,
            alerts,
            network,
            critical_banner,
            last_update: time_ago(fleet.updated_at, now),
        }
    }
}

fn network_status(online: usize, total: usize) -> &'static str {
    if online == 0 {
        "Offline"
    } else if (total - online) * 2 > total {
        "Degraded"
    } else {
        "Operational"
    }
}

/// One alert per node that is not quietly reporting: threshold breaches,
/// low batteries and lost nodes.
fn alert_for(node: &SensorNode, now: DateTime<Utc>) -> Option<AlertSummary> {
    let status = node.status();
    let kind = match status {
        NodeStatus::Offline => "Node Offline",
        _ => node.alert_kind()?,
    };
    let severity = match status {
        NodeStatus::Safe => NodeStatus::Warning,
        other => other,
    };

    Some(AlertSummary {
        node_id: node.id.clone(),
        location: node.sector.clone(),
        kind: kind.to_string(),
        severity,
        last_seen: time_ago(node.last_update, now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Fleet;

    #[test]
    fn test_overview_of_seeded_fleet() {
        let now = Utc::now();
        let fleet = Fleet::seed_at(now);
        let overview = DashboardService::new().overview(&fleet, now);

        assert_eq!(overview.metrics.active_sensors, 5);
        assert_eq!(overview.metrics.total_sensors, 6);
        assert_eq!(overview.metrics.active_alerts, 3);
        assert_eq!(overview.metrics.critical_alerts, 1);
        assert_eq!(overview.metrics.warning_alerts, 2);
        assert_eq!(overview.metrics.last_rainfall, "2.3mm (6 hours ago)");
        assert_eq!(overview.metrics.battery_health, Some(83));
        assert_eq!(overview.metrics.network_status, "Operational");
        assert_eq!(overview.last_update, "now");
    }

    #[test]
    fn test_alerts_are_most_severe_first() {
        let now = Utc::now();
        let overview = DashboardService::new().overview(&Fleet::seed_at(now), now);

        let ids: Vec<&str> = overview.alerts.iter().map(|a| a.node_id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"Node-07"));
        assert_eq!(ids.last(), Some(&"Node-18"));
        assert_eq!(overview.alerts.len(), 4);
        assert_eq!(overview.alerts[0].kind, "High Vibration");
        assert_eq!(overview.alerts[3].kind, "Node Offline");
        assert_eq!(overview.alerts[3].last_seen, "3 hours ago");
    }

    #[test]
    fn test_critical_banner() {
        let now = Utc::now();
        let mut fleet = Fleet::seed_at(now);
        let overview = DashboardService::new().overview(&fleet, now);
        assert_eq!(
            overview.critical_banner.as_deref(),
            Some("High Vibration detected at Node-07. Immediate attention required.")
        );

        for node in fleet.nodes.iter_mut() {
            node.vibration = 10.0;
            node.tilt = 1.0;
        }
        let overview = DashboardService::new().overview(&fleet, now);
        assert!(overview.critical_banner.is_none());
        assert_eq!(overview.metrics.active_alerts, 0);
    }

    #[test]
    fn test_network_rows_exclude_offline_nodes() {
        let now = Utc::now();
        let overview = DashboardService::new().overview(&Fleet::seed_at(now), now);
        assert_eq!(overview.network.len(), 5);
        assert!(overview.network.iter().all(|row| row.node_id != "Node-18"));
        assert_eq!(overview.network[0].status, NodeStatus::Critical);
    }

    #[test]
    fn test_network_status() {
        assert_eq!(network_status(0, 6), "Offline");
        assert_eq!(network_status(2, 6), "Degraded");
        assert_eq!(network_status(3, 6), "Operational");
        assert_eq!(network_status(6, 6), "Operational");
    }
}
