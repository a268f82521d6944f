use crate::telemetry::{time_ago, FleetSnapshot, HealthStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemOverview {
    pub overall_status: String,
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub offline_nodes: usize,
    pub average_battery: Option<u8>,
    pub data_collection_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeHealthRow {
    pub node_id: String,
    pub status: HealthStatus,
    pub battery: f64,
    pub rssi: Option<i32>,
    pub last_seen: String,
    pub uptime: String,
    pub data_quality: f64,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemComponent {
    pub name: String,
    pub status: HealthStatus,
    pub uptime: String,
    pub last_restart: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub overview: SystemOverview,
    pub nodes: Vec<NodeHealthRow>,
    pub components: Vec<SystemComponent>,
}

#[derive(Clone, Debug, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    pub fn report(&self, fleet: &FleetSnapshot, now: DateTime<Utc>) -> HealthReport {
        let nodes: Vec<NodeHealthRow> = fleet
            .nodes
            .iter()
            .map(|node| NodeHealthRow {
                node_id: node.id.clone(),
                status: node.health(),
                battery: node.battery,
                rssi: if node.online { node.rssi } else { None },
                last_seen: time_ago(node.last_update, now),
                uptime: node.uptime_display(),
                data_quality: node.data_quality,
                issues: node.issues.clone(),
            })
            .collect();

        let active_nodes = fleet.nodes.iter().filter(|node| node.online).count();
        let overall_status = if active_nodes == 0 {
            "outage"
        } else if nodes.iter().any(|row| row.status == HealthStatus::Critical) {
            "degraded"
        } else {
            "operational"
        };

        HealthReport {
            overview: SystemOverview {
                overall_status: overall_status.to_string(),
                total_nodes: fleet.nodes.len(),
                active_nodes,
                offline_nodes: fleet.nodes.len() - active_nodes,
                average_battery: fleet.average_battery(),
                data_collection_rate: fleet.data_collection_rate(),
            },
            nodes,
            components: system_components(),
        }
    }
}

fn system_components() -> Vec<SystemComponent> {
    [
        ("Data Collection Service", HealthStatus::Healthy, "99.8%", "3 days ago"),
        ("ML Prediction Engine", HealthStatus::Healthy, "99.2%", "1 day ago"),
        ("Alert Management", HealthStatus::Healthy, "100%", "7 days ago"),
        ("Database", HealthStatus::Healthy, "99.9%", "12 days ago"),
        ("Weather Integration", HealthStatus::Warning, "97.3%", "2 hours ago"),
    ]
    .into_iter()
    .map(|(name, status, uptime, last_restart)| SystemComponent {
        name: name.to_string(),
        status,
        uptime: uptime.to_string(),
        last_restart: last_restart.to_string(),
    })
    .collect()
}
