//! DNF backend (Fedora/RHEL/CentOS)

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use super::PackageBackend;
use crate::error::PackageError;
use crate::exec::{CommandOutput, CommandRunner, has_tool};

/// `check-update` exits with this when updates are available
const UPDATES_AVAILABLE: i32 = 100;

/// Queries dnf and rpm through a `CommandRunner`
///
/// Falls back to `yum` if `dnf` is not available.
pub struct DnfBackend {
    runner: Arc<dyn CommandRunner>,
    tool: OnceCell<Option<&'static str>>,
}

impl DnfBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            tool: OnceCell::new(),
        }
    }

    /// dnf, else yum, detected once
    async fn tool(&self) -> Option<&'static str> {
        *self
            .tool
            .get_or_init(|| async {
                for tool in ["dnf", "yum"] {
                    if has_tool(self.runner.as_ref(), tool).await {
                        return Some(tool);
                    }
                }
                None
            })
            .await
    }

    async fn pkg_cmd(&self, args: &str) -> Result<String, PackageError> {
        let tool = self.tool().await.ok_or_else(|| {
            PackageError::ManagerNotFound("neither dnf nor yum found".to_string())
        })?;
        Ok(format!("{tool} -q {args}"))
    }

    async fn query(&self, cmd: &str, ok: &[i32]) -> Result<CommandOutput, PackageError> {
        let result = self.runner.run(cmd).await?;
        if !ok.contains(&result.status) {
            return Err(PackageError::CommandFailed {
                status: result.status,
                message: result.stderr,
            });
        }
        Ok(result)
    }

    /// Count `check-update` entries, ignoring the obsoletes section
    fn parse_upgradable(output: &str) -> u64 {
        let mut count = 0;

        for line in output.lines() {
            if line.starts_with("Obsoleting") {
                break;
            }
            if line.is_empty() || line.starts_with("Last metadata") || line.starts_with(' ') {
                continue;
            }

            // Example: vim-enhanced.x86_64 2:8.2.2637-20.el9_1 baseos
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 && parts[0].contains('.') {
                count += 1;
            }
        }

        count
    }

    fn parse_installed(output: &str) -> u64 {
        output.lines().filter(|line| !line.trim().is_empty()).count() as u64
    }

    /// First column of `repolist --enabled`
    fn parse_repolist(output: &str) -> Vec<String> {
        output
            .lines()
            .filter(|line| !line.starts_with("repo id") && !line.starts_with("Last metadata"))
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl PackageBackend for DnfBackend {
    fn name(&self) -> &'static str {
        "dnf"
    }

    async fn is_available(&self) -> bool {
        self.tool().await.is_some() && has_tool(self.runner.as_ref(), "rpm").await
    }

    #[instrument(skip(self))]
    async fn count_upgradable(&self) -> Result<u64, PackageError> {
        let cmd = self.pkg_cmd("check-update").await?;
        let result = self.query(&cmd, &[0, UPDATES_AVAILABLE]).await?;
        let count = Self::parse_upgradable(&result.stdout);
        debug!(count, "upgradable packages");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn count_installed(&self) -> Result<u64, PackageError> {
        let result = self.query("rpm -qa", &[0]).await?;
        Ok(Self::parse_installed(&result.stdout))
    }

    #[instrument(skip(self))]
    async fn enabled_repositories(&self) -> Result<Vec<String>, PackageError> {
        let cmd = self.pkg_cmd("repolist --enabled").await?;
        let result = self.query(&cmd, &[0]).await?;
        Ok(Self::parse_repolist(&result.stdout))
    }
}
