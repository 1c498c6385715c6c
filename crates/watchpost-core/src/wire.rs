//! Entity model to wire shapes
//!
//! Outbound only. Responses are simple enough that nothing is decoded back
//! into the model.

use std::sync::Arc;

use watchpost_api::{
    HostWire, IssueWire, LogLineWire, MetricStatusWire, MetricValueWire, MetricWire,
    ReportRequest, ReporterWire,
};

use crate::error::AgentError;
use crate::model::{Host, Issue, LogLine, Metric, MetricStatus, MetricValue, Reporter, ancestors};

/// Id sent for every issue until issues carry real data
pub const UNMAPPED_ISSUE_ID: &str = "???";

/// Host id, resolved name, and ancestor ids (closest first, root last)
///
/// # Errors
/// Returns `AgentError::Host` if the name cannot be resolved.
pub fn host_to_wire(host: &dyn Host) -> Result<HostWire, AgentError> {
    Ok(HostWire {
        id: host.id().to_string(),
        human_name: host.human_name()?,
        parents: ancestors(host).iter().map(|h| h.id().to_string()).collect(),
    })
}

#[must_use]
pub fn metric_to_wire(metric: &Metric) -> MetricWire {
    let value = match metric.value() {
        MetricValue::Uncountable(n) => MetricValueWire::Uncountable { int_value: *n },
        MetricValue::StringArray(items) => MetricValueWire::StringArray {
            string_array_value: items.clone(),
        },
    };

    MetricWire {
        id: metric.id().to_string(),
        human_name: metric.human_name().to_string(),
        human_desc: metric.human_desc().to_string(),
        status: status_to_wire(metric.status()),
        value,
    }
}

fn status_to_wire(status: MetricStatus) -> MetricStatusWire {
    match status {
        MetricStatus::None => MetricStatusWire::None,
        MetricStatus::Healthy => MetricStatusWire::Healthy,
        MetricStatus::Warning => MetricStatusWire::Warning,
        MetricStatus::Danger => MetricStatusWire::Danger,
    }
}

#[must_use]
pub fn issue_to_wire(_issue: &Issue) -> IssueWire {
    IssueWire {
        id: UNMAPPED_ISSUE_ID.to_string(),
    }
}

/// Snapshot one reporter
///
/// # Errors
/// Fails if the reporter cannot produce its issues, metrics, or sub-hosts,
/// or a sub-host name cannot be resolved.
pub async fn reporter_to_wire(reporter: &dyn Reporter) -> Result<ReporterWire, AgentError> {
    let issues = reporter.issues().await?;
    let metrics = reporter.metrics().await?;
    let hosts = reporter.hosts().await?;

    Ok(ReporterWire {
        id: reporter.id().to_string(),
        issues: issues.iter().map(issue_to_wire).collect(),
        metrics: metrics.iter().map(metric_to_wire).collect(),
        hosts: hosts
            .iter()
            .map(|h| host_to_wire(h.as_ref()))
            .collect::<Result<_, _>>()?,
    })
}

/// Full `Report` request for a host and its reporters
///
/// # Errors
/// Fails on the first host or reporter that cannot be mapped.
pub async fn report_request(
    host: &dyn Host,
    reporters: &[Arc<dyn Reporter>],
) -> Result<ReportRequest, AgentError> {
    let mut wires = Vec::with_capacity(reporters.len());
    for reporter in reporters {
        wires.push(reporter_to_wire(reporter.as_ref()).await?);
    }

    Ok(ReportRequest {
        host: host_to_wire(host)?,
        reporters: wires,
    })
}

#[must_use]
pub fn log_line_to_wire(line: LogLine) -> LogLineWire {
    LogLineWire {
        reporter: line.reporter_id,
        timestamp: line.timestamp.into(),
        line: line.line,
        host: line.host_name,
        tags: line.tags,
    }
}
