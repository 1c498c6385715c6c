//! Request types sent to the collector

use serde::{Deserialize, Serialize};

use crate::snapshot::{HostWire, ReporterWire};

/// Full snapshot sent once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub host: HostWire,
    pub reporters: Vec<ReporterWire>,
}

/// Certificate signing request, PEM encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub csr: String,
}
