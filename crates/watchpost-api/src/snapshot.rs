//! Snapshot shapes for hosts, reporters, metrics, and issues

use serde::{Deserialize, Serialize};

/// A host as seen by the collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostWire {
    pub id: String,
    pub human_name: String,
    /// Ancestor ids, closest ancestor first, root last
    #[serde(default)]
    pub parents: Vec<String>,
}

/// One reporter's view of its host at tick time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReporterWire {
    pub id: String,
    #[serde(default)]
    pub issues: Vec<IssueWire>,
    #[serde(default)]
    pub metrics: Vec<MetricWire>,
    /// Sub-hosts discovered by this reporter
    #[serde(default)]
    pub hosts: Vec<HostWire>,
}

/// Issue placeholder
///
/// Issues carry no mapped fields yet; every issue goes out with a fixed
/// placeholder id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueWire {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWire {
    pub id: String,
    pub human_name: String,
    pub human_desc: String,
    pub status: MetricStatusWire,
    /// Discriminant and the single value field it selects
    #[serde(flatten)]
    pub value: MetricValueWire,
}

/// Metric value, tagged by metric type
///
/// Serializes as `{"type": "uncountable", "int_value": 3}` or
/// `{"type": "string_array", "string_array_value": ["a", "b"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValueWire {
    Uncountable { int_value: i64 },
    StringArray { string_array_value: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatusWire {
    None,
    Healthy,
    Warning,
    Danger,
}
