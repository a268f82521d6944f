use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Vibration,
    Tilt,
    Rainfall,
    Temperature,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Vibration,
        Metric::Tilt,
        Metric::Rainfall,
        Metric::Temperature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Vibration => "vibration",
            Metric::Tilt => "tilt",
            Metric::Rainfall => "rainfall",
            Metric::Temperature => "temperature",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Vibration => "Vibration",
            Metric::Tilt => "Tilt Angle",
            Metric::Rainfall => "Rainfall",
            Metric::Temperature => "Temperature",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::Vibration => "µg",
            Metric::Tilt => "°",
            Metric::Rainfall => "mm",
            Metric::Temperature => "°C",
        }
    }

    /// Chart palette entry, also used as a CSS custom property name.
    pub fn color(&self) -> &'static str {
        match self {
            Metric::Vibration => "chart-primary",
            Metric::Tilt => "chart-secondary",
            Metric::Rainfall => "chart-tertiary",
            Metric::Temperature => "chart-warning",
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|metric| metric.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown metric: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendTimeframe {
    #[serde(rename = "24h")]
    Day,
    #[default]
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl TrendTimeframe {
    pub const ALL: [TrendTimeframe; 4] = [
        TrendTimeframe::Day,
        TrendTimeframe::Week,
        TrendTimeframe::Month,
        TrendTimeframe::Quarter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendTimeframe::Day => "24h",
            TrendTimeframe::Week => "7d",
            TrendTimeframe::Month => "30d",
            TrendTimeframe::Quarter => "90d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendTimeframe::Day => "24 Hours",
            TrendTimeframe::Week => "7 Days",
            TrendTimeframe::Month => "30 Days",
            TrendTimeframe::Quarter => "90 Days",
        }
    }

    /// Number of trailing daily points covered.
    pub fn days(&self) -> usize {
        match self {
            TrendTimeframe::Day => 1,
            TrendTimeframe::Week => 7,
            TrendTimeframe::Month => 30,
            TrendTimeframe::Quarter => 90,
        }
    }
}

impl FromStr for TrendTimeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrendTimeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| format!("unknown timeframe: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
    pub latest: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub node_id: String,
    /// `None` when the requested metric is unknown
    pub metric: Option<Metric>,
    pub timeframe: TrendTimeframe,
    pub points: Vec<TrendPoint>,
    pub summary: Option<TrendSummary>,
}

impl TrendSeries {
    pub fn unit(&self) -> &'static str {
        self.metric.map_or("", |m| m.unit())
    }

    pub fn color(&self) -> &'static str {
        self.metric.map_or("chart-primary", |m| m.color())
    }

    pub fn title(&self) -> String {
        let metric = self.metric.map_or("Unknown", |m| m.label());
        format!("{} Trend - {}", metric, self.node_id)
    }

    /// `points` attribute of an SVG polyline spanning a `width` x `height`
    /// box, with the smallest value at the bottom edge.
    pub fn polyline(&self, width: f64, height: f64) -> String {
        let Some(summary) = &self.summary else {
            return String::new();
        };
        let range = summary.maximum - summary.minimum;
        let step = if self.points.len() > 1 {
            width / (self.points.len() - 1) as f64
        } else {
            0.0
        };

        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let x = if self.points.len() > 1 {
                    i as f64 * step
                } else {
                    width / 2.0
                };
                let y = if range > 0.0 {
                    height - (point.value - summary.minimum) / range * height
                } else {
                    height / 2.0
                };
                format!("{:.1},{:.1}", x, y)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn summarize(points: &[TrendPoint]) -> Option<TrendSummary> {
    let latest = points.last()?.value;
    let values = points.iter().map(|p| p.value);
    let sum: f64 = values.clone().sum();
    let maximum = values.clone().fold(f64::NEG_INFINITY, f64::max);
    let minimum = values.fold(f64::INFINITY, f64::min);
    let average = (sum / points.len() as f64 * 10.0).round() / 10.0;

    Some(TrendSummary {
        average,
        maximum,
        minimum,
        latest,
        count: points.len(),
    })
}

/// Daily history per metric for the monitored nodes.
pub struct TrendService {
    nodes: Vec<String>,
    history: HashMap<Metric, Vec<TrendPoint>>,
}

impl TrendService {
    pub fn new(nodes: Vec<String>) -> Self {
        let history = HashMap::from([
            (
                Metric::Vibration,
                daily_points(&[23.0, 34.0, 28.0, 45.0, 67.0, 89.0, 156.0]),
            ),
            (
                Metric::Tilt,
                daily_points(&[2.1, 2.3, 2.8, 4.5, 6.7, 8.9, 12.3]),
            ),
            (
                Metric::Rainfall,
                daily_points(&[0.0, 2.3, 5.7, 12.1, 8.4, 15.2, 23.8]),
            ),
            (Metric::Temperature, Vec::new()),
        ]);

        Self { nodes, history }
    }

    pub fn available_nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn default_node(&self) -> &str {
        self.nodes
            .iter()
            .find(|id| id.as_str() == "Node-07")
            .or_else(|| self.nodes.first())
            .map_or("", |id| id.as_str())
    }

    /// Trailing history for one node. Unknown nodes and metrics yield an
    /// empty series.
    pub fn series(&self, node_id: &str, metric: &str, timeframe: TrendTimeframe) -> TrendSeries {
        let metric = metric.parse::<Metric>().ok();
        let known_node = self.nodes.iter().any(|id| id.eq_ignore_ascii_case(node_id));

        let points: Vec<TrendPoint> = match (metric, known_node) {
            (Some(metric), true) => {
                let history = self.history.get(&metric).map_or(&[][..], |h| h.as_slice());
                let start = history.len().saturating_sub(timeframe.days());
                history[start..].to_vec()
            }
            _ => Vec::new(),
        };

        TrendSeries {
            node_id: node_id.to_string(),
            metric,
            timeframe,
            summary: summarize(&points),
            points,
        }
    }
}

fn daily_points(values: &[f64]) -> Vec<TrendPoint> {
    let first = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    values
        .iter()
        .zip(first.iter_days())
        .map(|(value, date)| TrendPoint {
            date,
            value: *value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TrendService {
        TrendService::new(vec!["Node-07".to_string(), "Node-12".to_string()])
    }

    #[test]
    fn test_week_of_vibration() {
        let series = service().series("Node-07", "vibration", TrendTimeframe::Week);
        assert_eq!(series.points.len(), 7);
        assert_eq!(series.unit(), "µg");

        let summary = series.summary.unwrap();
        assert_eq!(summary.latest, 156.0);
        assert_eq!(summary.maximum, 156.0);
        assert_eq!(summary.minimum, 23.0);
        assert_eq!(summary.average, 63.1);
        assert_eq!(summary.count, 7);
    }

    #[test]
    fn test_day_timeframe_keeps_latest_point() {
        let series = service().series("Node-07", "tilt", TrendTimeframe::Day);
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].value, 12.3);
        assert_eq!(
            series.points[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
    }

    #[test]
    fn test_unknown_metric_or_node_is_empty() {
        let series = service().series("Node-07", "pressure", TrendTimeframe::Week);
        assert!(series.metric.is_none());
        assert!(series.points.is_empty());
        assert!(series.summary.is_none());
        assert_eq!(series.polyline(600.0, 200.0), "");

        let series = service().series("Node-99", "vibration", TrendTimeframe::Week);
        assert!(series.points.is_empty());

        let series = service().series("Node-07", "temperature", TrendTimeframe::Quarter);
        assert_eq!(series.metric, Some(Metric::Temperature));
        assert!(series.points.is_empty());
    }

    #[test]
    fn test_polyline_spans_the_box() {
        let series = service().series("Node-07", "rainfall", TrendTimeframe::Month);
        let polyline = series.polyline(600.0, 200.0);
        let coords: Vec<&str> = polyline.split(' ').collect();
        assert_eq!(coords.len(), 7);
        assert_eq!(coords[0], "0.0,200.0");
        assert_eq!(coords[6], "600.0,0.0");

        let single = service().series("Node-07", "rainfall", TrendTimeframe::Day);
        assert_eq!(single.polyline(600.0, 200.0), "300.0,100.0");
    }

    #[test]
    fn test_default_node() {
        assert_eq!(service().default_node(), "Node-07");
        assert_eq!(TrendService::new(vec![]).default_node(), "");
    }
}
