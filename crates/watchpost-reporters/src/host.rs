//! The machine the agent runs on

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};
use watchpost_core::{Host, HostError, Reporter};

const HOSTNAME_FILES: [&str; 2] = ["/proc/sys/kernel/hostname", "/etc/hostname"];

/// Local host
///
/// Its reporters are produced by the registry from the host itself, so they
/// are attached once after construction rather than passed in.
pub struct LocalHost {
    name_files: Vec<PathBuf>,
    reporters: OnceLock<Vec<Arc<dyn Reporter>>>,
}

impl LocalHost {
    pub const ID: &'static str = "local";

    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_name_files(HOSTNAME_FILES.iter().map(PathBuf::from).collect())
    }

    /// Resolve the host name from `name_files`, first non-empty wins
    #[must_use]
    pub fn with_name_files(name_files: Vec<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            name_files,
            reporters: OnceLock::new(),
        })
    }

    /// Attach the reporters produced for this host
    ///
    /// Only the first call has any effect. Returns whether it was this one.
    pub fn attach(&self, reporters: Vec<Arc<dyn Reporter>>) -> bool {
        let ids: Vec<String> = reporters.iter().map(|r| r.id().to_string()).collect();
        match self.reporters.set(reporters) {
            Ok(()) => {
                debug!(reporters = ?ids, "attached reporters");
                true
            }
            Err(_) => {
                warn!("reporters already attached, ignoring");
                false
            }
        }
    }

    fn read_name(&self) -> Option<String> {
        self.name_files
            .iter()
            .filter_map(|path| std::fs::read_to_string(path).ok())
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
            .or_else(|| {
                std::env::var("HOSTNAME")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
    }
}

impl Host for LocalHost {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_local(&self) -> bool {
        true
    }

    fn human_name(&self) -> Result<String, HostError> {
        self.read_name().ok_or_else(|| HostError::NameUnavailable {
            host: Self::ID.to_string(),
            reason: "no hostname configured".to_string(),
        })
    }

    fn parent(&self) -> Option<Arc<dyn Host>> {
        None
    }

    fn reporters(&self) -> Vec<Arc<dyn Reporter>> {
        self.reporters.get().cloned().unwrap_or_default()
    }
}

impl fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHost")
            .field("reporters", &self.reporters.get().map_or(0, Vec::len))
            .finish_non_exhaustive()
    }
}
