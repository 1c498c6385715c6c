//! Runtime settings for sessions and credentials

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval between full snapshot reports
pub const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// In-flight log lines held between reporters and the relay
pub const LOG_QUEUE_CAPACITY: usize = 10;

/// Credentials expiring within this many days are due for renewal
pub const RENEWAL_WINDOW_DAYS: i64 = 30;

/// Runs end this many days before credential expiry
pub const ROTATION_LEAD_DAYS: i64 = 20;

/// Settings for a single orchestrator run
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay between ticks
    pub report_interval: Duration,
    /// Capacity of the shared log aggregation queue
    pub log_queue_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            report_interval: REPORT_INTERVAL,
            log_queue_capacity: LOG_QUEUE_CAPACITY,
        }
    }
}

/// When to renew and when to rotate
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    /// Expiry horizon that makes a credential due for renewal
    pub renewal_window: chrono::Duration,
    /// How long before expiry the run terminates for rotation
    pub rotation_lead: chrono::Duration,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            renewal_window: chrono::Duration::days(RENEWAL_WINDOW_DAYS),
            rotation_lead: chrono::Duration::days(ROTATION_LEAD_DAYS),
        }
    }
}

/// Filesystem locations of the agent's credentials (all PEM)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialPaths {
    /// CA certificate(s) trusted for the collector
    pub ca: PathBuf,
    /// Client certificate chain
    pub cert: PathBuf,
    /// Client private key
    pub key: PathBuf,
    /// Provisioning certificate used when `cert` does not exist
    pub bootstrap_cert: PathBuf,
    /// Provisioning private key
    pub bootstrap_key: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        Self {
            ca: PathBuf::from("/etc/watchpost/ca.pem"),
            cert: PathBuf::from("/var/lib/watchpost/client.pem"),
            key: PathBuf::from("/var/lib/watchpost/client-key.pem"),
            bootstrap_cert: PathBuf::from("/etc/watchpost/provisioning.pem"),
            bootstrap_key: PathBuf::from("/etc/watchpost/provisioning-key.pem"),
        }
    }
}
