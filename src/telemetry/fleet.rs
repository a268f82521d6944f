use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::classify::{self, HealthStatus, NodeStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorNode {
    pub id: String,
    pub sector: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rock_type: String,
    pub slope_angle: f64,
    /// Micro-g
    pub vibration: f64,
    /// Degrees
    pub tilt: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub battery: f64,
    pub rssi: Option<i32>,
    pub online: bool,
    pub last_update: DateTime<Utc>,
    pub uptime_hours: u32,
    pub data_quality: f64,
    pub issues: Vec<String>,
}

impl SensorNode {
    pub fn status(&self) -> NodeStatus {
        classify::node_status(self.online, self.vibration, self.tilt)
    }

    pub fn health(&self) -> HealthStatus {
        classify::node_health(
            self.online,
            self.battery,
            self.rssi,
            self.data_quality,
            !self.issues.is_empty(),
        )
    }

    pub fn battery_class(&self) -> &'static str {
        classify::battery_level(self.online.then_some(self.battery))
    }

    pub fn signal_strength(&self) -> &'static str {
        classify::signal_strength(if self.online { self.rssi } else { None })
    }

    pub fn uptime_display(&self) -> String {
        if self.uptime_hours >= 24 {
            format!("{} days", self.uptime_hours / 24)
        } else {
            format!("{} hours", self.uptime_hours)
        }
    }

    /// Short description of the alert a node is raising, if any.
    pub fn alert_kind(&self) -> Option<&'static str> {
        if !self.online {
            return None;
        }
        if self.vibration >= classify::VIBRATION_WARNING {
            Some("High Vibration")
        } else if self.tilt >= classify::TILT_WARNING {
            Some("Tilt Angle")
        } else if self.battery <= 35.0 {
            Some("Low Battery")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherStation {
    pub temperature: f64,
    pub humidity: f64,
    /// km/h
    pub wind_speed: f64,
    pub wind_direction: String,
    /// hPa
    pub pressure: f64,
    /// mm/h, current
    pub rainfall: f64,
    /// mm, last recorded rainfall event
    pub last_rainfall_amount: f64,
    pub last_rainfall_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fleet {
    pub nodes: Vec<SensorNode>,
    pub weather: WeatherStation,
    /// Number of simulation steps applied since seeding
    pub tick: u64,
    pub updated_at: DateTime<Utc>,
}

/// An immutable copy of the fleet handed out to readers.
pub type FleetSnapshot = Fleet;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub safe: usize,
    pub warning: usize,
    pub critical: usize,
    pub offline: usize,
}

impl StatusCounts {
    pub fn online(&self) -> usize {
        self.safe + self.warning + self.critical
    }

    pub fn alerts(&self) -> usize {
        self.warning + self.critical
    }
}

impl Fleet {
    pub fn seed() -> Self {
        Self::seed_at(Utc::now())
    }

    pub fn seed_at(now: DateTime<Utc>) -> Self {
        let nodes = vec![
            seed_node(SeedNode {
                id: "Node-01",
                sector: "Sector A-2",
                position: (47.6062, -122.3321),
                rock_type: "Limestone",
                slope_angle: 45.0,
                readings: (23.0, 2.1, 18.5, 67.0),
                battery: 89.0,
                rssi: Some(-67),
                seen_minutes_ago: 2,
                uptime_hours: 45 * 24,
                data_quality: 98.5,
                issues: &[],
            }, now),
            seed_node(SeedNode {
                id: "Node-03",
                sector: "Sector A-1",
                position: (47.6042, -122.3331),
                rock_type: "Basalt",
                slope_angle: 43.0,
                readings: (78.0, 6.1, 18.0, 66.0),
                battery: 88.0,
                rssi: Some(-64),
                seen_minutes_ago: 1,
                uptime_hours: 38 * 24,
                data_quality: 99.1,
                issues: &[],
            }, now),
            seed_node(SeedNode {
                id: "Node-07",
                sector: "Sector A-3",
                position: (47.6082, -122.3341),
                rock_type: "Sandstone",
                slope_angle: 52.0,
                readings: (156.0, 12.3, 19.2, 72.0),
                battery: 67.0,
                rssi: Some(-72),
                seen_minutes_ago: 1,
                uptime_hours: 43 * 24,
                data_quality: 94.2,
                issues: &["Low battery", "Intermittent connectivity"],
            }, now),
            seed_node(SeedNode {
                id: "Node-12",
                sector: "Sector B-1",
                position: (47.6052, -122.3301),
                rock_type: "Shale",
                slope_angle: 38.0,
                readings: (89.0, 8.7, 17.8, 69.0),
                battery: 82.0,
                rssi: Some(-69),
                seen_minutes_ago: 3,
                uptime_hours: 41 * 24,
                data_quality: 97.8,
                issues: &[],
            }, now),
            seed_node(SeedNode {
                id: "Node-15",
                sector: "Sector C-1",
                position: (47.6072, -122.3361),
                rock_type: "Granite",
                slope_angle: 41.0,
                readings: (45.0, 4.2, 18.9, 65.0),
                battery: 91.0,
                rssi: Some(-64),
                seen_minutes_ago: 1,
                uptime_hours: 12,
                data_quality: 96.4,
                issues: &[],
            }, now),
            SensorNode {
                online: false,
                rssi: None,
                battery: 0.0,
                ..seed_node(SeedNode {
                    id: "Node-18",
                    sector: "Sector C-2",
                    position: (47.6092, -122.3311),
                    rock_type: "Limestone",
                    slope_angle: 47.0,
                    readings: (67.0, 6.8, 17.5, 70.0),
                    battery: 0.0,
                    rssi: None,
                    seen_minutes_ago: 180,
                    uptime_hours: 0,
                    data_quality: 0.0,
                    issues: &["Node offline", "No response", "Possible hardware failure"],
                }, now)
            },
        ];

        let weather = WeatherStation {
            temperature: 16.8,
            humidity: 71.0,
            wind_speed: 12.3,
            wind_direction: "NW".to_string(),
            pressure: 1013.2,
            rainfall: 0.0,
            last_rainfall_amount: 2.3,
            last_rainfall_at: now - Duration::hours(6),
        };

        Self {
            nodes,
            weather,
            tick: 0,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&SensorNode> {
        self.nodes.iter().find(|node| node.id.eq_ignore_ascii_case(id))
    }

    pub fn node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.iter().map(|node| node.id.clone()).collect();
        ids.sort();
        ids
    }

    pub fn status_counts(&self) -> StatusCounts {
        self.nodes
            .iter()
            .fold(StatusCounts::default(), |mut counts, node| {
                match node.status() {
                    NodeStatus::Safe => counts.safe += 1,
                    NodeStatus::Warning => counts.warning += 1,
                    NodeStatus::Critical => counts.critical += 1,
                    NodeStatus::Offline => counts.offline += 1,
                }
                counts
            })
    }

    /// Mean battery of the nodes still reporting, rounded to a whole percent.
    pub fn average_battery(&self) -> Option<u8> {
        let online: Vec<f64> = self
            .nodes
            .iter()
            .filter(|node| node.online)
            .map(|node| node.battery)
            .collect();
        if online.is_empty() {
            return None;
        }
        let mean = online.iter().sum::<f64>() / online.len() as f64;
        Some(mean.round().clamp(0.0, 100.0) as u8)
    }

    /// Mean data quality over the whole fleet, offline nodes counting as zero.
    pub fn data_collection_rate(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let total: f64 = self.nodes.iter().map(|node| node.data_quality).sum();
        (total / self.nodes.len() as f64 * 10.0).round() / 10.0
    }
}

struct SeedNode {
    id: &'static str,
    sector: &'static str,
    position: (f64, f64),
    rock_type: &'static str,
    slope_angle: f64,
    /// vibration, tilt, temperature, humidity
    readings: (f64, f64, f64, f64),
    battery: f64,
    rssi: Option<i32>,
    seen_minutes_ago: i64,
    uptime_hours: u32,
    data_quality: f64,
    issues: &'static [&'static str],
}

fn seed_node(seed: SeedNode, now: DateTime<Utc>) -> SensorNode {
    let (vibration, tilt, temperature, humidity) = seed.readings;
    SensorNode {
        id: seed.id.to_string(),
        sector: seed.sector.to_string(),
        latitude: seed.position.0,
        longitude: seed.position.1,
        rock_type: seed.rock_type.to_string(),
        slope_angle: seed.slope_angle,
        vibration,
        tilt,
        temperature,
        humidity,
        battery: seed.battery,
        rssi: seed.rssi,
        online: true,
        last_update: now - Duration::minutes(seed.seen_minutes_ago),
        uptime_hours: seed.uptime_hours,
        data_quality: seed.data_quality,
        issues: seed.issues.iter().map(|issue| issue.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_fleet_statuses() {
        let fleet = Fleet::seed();
        assert_eq!(fleet.nodes.len(), 6);
        assert_eq!(fleet.node("Node-07").unwrap().status(), NodeStatus::Critical);
        assert_eq!(fleet.node("node-12").unwrap().status(), NodeStatus::Warning);
        assert_eq!(fleet.node("Node-15").unwrap().status(), NodeStatus::Safe);
        assert_eq!(fleet.node("Node-18").unwrap().status(), NodeStatus::Offline);
        assert!(fleet.node("Node-99").is_none());
    }

    #[test]
    fn test_status_counts() {
        let counts = Fleet::seed().status_counts();
        assert_eq!(
            counts,
            StatusCounts {
                safe: 2,
                warning: 2,
                critical: 1,
                offline: 1
            }
        );
        assert_eq!(counts.online(), 5);
        assert_eq!(counts.alerts(), 3);
    }

    #[test]
    fn test_average_battery_ignores_offline_nodes() {
        // (89 + 88 + 67 + 82 + 91) / 5 = 83.4
        assert_eq!(Fleet::seed().average_battery(), Some(83));

        let mut fleet = Fleet::seed();
        fleet.nodes.iter_mut().for_each(|node| node.online = false);
        assert_eq!(fleet.average_battery(), None);
    }

    #[test]
    fn test_offline_node_display() {
        let fleet = Fleet::seed();
        let node = fleet.node("Node-18").unwrap();
        assert_eq!(node.signal_strength(), "Offline");
        assert_eq!(node.battery_class(), "text-status-offline");
        assert_eq!(node.health(), HealthStatus::Offline);
        assert_eq!(node.alert_kind(), None);
        assert_eq!(node.uptime_display(), "0 hours");
    }

    #[test]
    fn test_alert_kind() {
        let fleet = Fleet::seed();
        assert_eq!(fleet.node("Node-07").unwrap().alert_kind(), Some("High Vibration"));
        assert_eq!(fleet.node("Node-01").unwrap().alert_kind(), None);
        assert_eq!(fleet.node("Node-01").unwrap().uptime_display(), "45 days");
    }
}
