//! Metrics and their health status

use std::fmt;

/// Metric representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// A single integer count
    Uncountable,
    /// An ordered list of strings
    StringArray,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricType::Uncountable => write!(f, "uncountable"),
            MetricType::StringArray => write!(f, "string_array"),
        }
    }
}

/// Health derived from a metric's own thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStatus {
    None,
    Healthy,
    Warning,
    Danger,
}

/// Metric value; the variant is the metric's type tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricValue {
    Uncountable(i64),
    StringArray(Vec<String>),
}

impl MetricValue {
    /// Type tag for this value
    #[must_use]
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Uncountable(_) => MetricType::Uncountable,
            MetricValue::StringArray(_) => MetricType::StringArray,
        }
    }
}

/// Warning and danger levels for a count
///
/// Below `warning` is healthy, `[warning, danger)` is warning, and
/// `danger` and above is danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: i64,
    pub danger: i64,
}

impl Thresholds {
    #[must_use]
    pub fn new(warning: i64, danger: i64) -> Self {
        Self { warning, danger }
    }

    /// Classify a count against these levels
    #[must_use]
    pub fn classify(&self, value: i64) -> MetricStatus {
        if value < self.warning {
            MetricStatus::Healthy
        } else if value < self.danger {
            MetricStatus::Warning
        } else {
            MetricStatus::Danger
        }
    }

    fn explain(&self, status: MetricStatus) -> String {
        match status {
            MetricStatus::Healthy => format!(
                "This metric is healthy because the current level is below the configured warning level of {}.",
                self.warning
            ),
            MetricStatus::Warning => format!(
                "This metric is warning because the current level is between the configured warning level of {} and the danger level of {}.",
                self.warning, self.danger
            ),
            MetricStatus::Danger | MetricStatus::None => format!(
                "This metric is alerting because the current level is at or above the danger level of {}.",
                self.danger
            ),
        }
    }
}

/// Immutable snapshot of one measurement
///
/// Recomputed by its reporter every tick, never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    id: String,
    human_name: String,
    human_desc: String,
    status: MetricStatus,
    value: MetricValue,
}

impl Metric {
    /// Count without thresholds (status `None`)
    pub fn uncountable(
        id: impl Into<String>,
        human_name: impl Into<String>,
        human_desc: impl Into<String>,
        value: i64,
    ) -> Self {
        Self {
            id: id.into(),
            human_name: human_name.into(),
            human_desc: human_desc.into(),
            status: MetricStatus::None,
            value: MetricValue::Uncountable(value),
        }
    }

    /// Count whose status is derived from `thresholds`
    ///
    /// The description gains a sentence explaining the status.
    pub fn with_thresholds(
        id: impl Into<String>,
        human_name: impl Into<String>,
        human_desc: impl Into<String>,
        value: i64,
        thresholds: Thresholds,
    ) -> Self {
        let status = thresholds.classify(value);
        let human_desc = format!("{} {}", human_desc.into(), thresholds.explain(status));
        Self {
            id: id.into(),
            human_name: human_name.into(),
            human_desc,
            status,
            value: MetricValue::Uncountable(value),
        }
    }

    /// Ordered string list (status `None`)
    pub fn string_array(
        id: impl Into<String>,
        human_name: impl Into<String>,
        human_desc: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            human_name: human_name.into(),
            human_desc: human_desc.into(),
            status: MetricStatus::None,
            value: MetricValue::StringArray(values),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn human_name(&self) -> &str {
        &self.human_name
    }

    #[must_use]
    pub fn human_desc(&self) -> &str {
        &self.human_desc
    }

    #[must_use]
    pub fn status(&self) -> MetricStatus {
        self.status
    }

    #[must_use]
    pub fn metric_type(&self) -> MetricType {
        self.value.metric_type()
    }

    #[must_use]
    pub fn value(&self) -> &MetricValue {
        &self.value
    }
}
