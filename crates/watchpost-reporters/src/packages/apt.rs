//! APT backend (Debian/Ubuntu)

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::PackageBackend;
use crate::error::PackageError;
use crate::exec::{CommandOutput, CommandRunner, has_tool};

const LIST_UPGRADABLE: &str = "apt list --upgradable 2>/dev/null";
const INSTALLED_STATUS: &str = r"dpkg-query -W -f '${db:Status-Status}\n'";
const POLICY: &str = "apt-cache policy";

/// Queries apt and dpkg through a `CommandRunner`
pub struct AptBackend {
    runner: Arc<dyn CommandRunner>,
}

impl AptBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn query(&self, cmd: &str) -> Result<CommandOutput, PackageError> {
        let result = self.runner.run(cmd).await?;
        if !result.success() {
            return Err(PackageError::CommandFailed {
                status: result.status,
                message: result.stderr,
            });
        }
        Ok(result)
    }

    /// Count `apt list --upgradable` entries
    fn parse_upgradable(output: &str) -> u64 {
        // Example: vim/stable 2:9.0.1378-2+deb12u1 amd64 [upgradable from: 2:9.0.1378-2]
        output
            .lines()
            .filter(|line| !line.is_empty())
            .filter(|line| !line.starts_with("Listing") && !line.starts_with("WARNING"))
            .filter(|line| {
                line.split_whitespace()
                    .next()
                    .is_some_and(|name_arch| name_arch.contains('/'))
            })
            .count() as u64
    }

    fn parse_installed(output: &str) -> u64 {
        output.lines().filter(|line| line.trim() == "installed").count() as u64
    }

    /// Source lines of `apt-cache policy`, deduplicated across architectures
    fn parse_policy(output: &str) -> Result<Vec<String>, PackageError> {
        if !output.contains("Package files:") {
            return Err(PackageError::ParseError(
                "no package files section in apt-cache policy output".to_string(),
            ));
        }

        let mut repos: Vec<String> = Vec::new();
        let mut in_package_files = false;

        for line in output.lines() {
            if line.starts_with("Package files:") {
                in_package_files = true;
                continue;
            }
            if !line.starts_with(' ') {
                // "Pinned packages:" or another section
                in_package_files = false;
                continue;
            }
            if !in_package_files {
                continue;
            }

            // Example: 500 http://deb.debian.org/debian bookworm/main amd64 Packages
            let parts: Vec<&str> = line.split_whitespace().collect();
            let [priority, url, suite, ..] = parts.as_slice() else {
                continue;
            };
            if priority.parse::<i32>().is_err() || !url.contains("://") {
                continue;
            }

            let repo = format!("{url} {suite}");
            if !repos.contains(&repo) {
                repos.push(repo);
            }
        }

        Ok(repos)
    }
}

#[async_trait]
impl PackageBackend for AptBackend {
    fn name(&self) -> &'static str {
        "apt"
    }

    async fn is_available(&self) -> bool {
        has_tool(self.runner.as_ref(), "apt").await
            && has_tool(self.runner.as_ref(), "dpkg-query").await
    }

    #[instrument(skip(self))]
    async fn count_upgradable(&self) -> Result<u64, PackageError> {
        let result = self.query(LIST_UPGRADABLE).await?;
        let count = Self::parse_upgradable(&result.stdout);
        debug!(count, "upgradable packages");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn count_installed(&self) -> Result<u64, PackageError> {
        let result = self.query(INSTALLED_STATUS).await?;
        Ok(Self::parse_installed(&result.stdout))
    }

    #[instrument(skip(self))]
    async fn enabled_repositories(&self) -> Result<Vec<String>, PackageError> {
        let result = self.query(POLICY).await?;
        Self::parse_policy(&result.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedRunner;

    const POLICY_OUTPUT: &str = "Package files:
 100 /var/lib/dpkg/status
     release a=now
 500 http://security.debian.org/debian-security bookworm-security/main amd64 Packages
     release v=12,o=Debian,a=stable-security,n=bookworm-security,l=Debian-Security,c=main,b=amd64
     origin security.debian.org
 500 http://deb.debian.org/debian bookworm/main i386 Packages
     release v=12.5,o=Debian,a=stable,n=bookworm,l=Debian,c=main,b=i386
     origin deb.debian.org
 500 http://deb.debian.org/debian bookworm/main amd64 Packages
     release v=12.5,o=Debian,a=stable,n=bookworm,l=Debian,c=main,b=amd64
     origin deb.debian.org
Pinned packages:
";

    #[test]
    fn test_parse_upgradable() {
        let output = r"Listing... Done
vim/now 2:8.2.2434-3+deb11u1 amd64 [upgradable from: 2:8.2.2434-3]
curl/stable 7.74.0-1.3+deb11u14 amd64 [upgradable from: 7.74.0-1.3+deb11u7]";

        assert_eq!(AptBackend::parse_upgradable(output), 2);
        assert_eq!(AptBackend::parse_upgradable("Listing... Done\n"), 0);
    }

    #[test]
    fn test_parse_installed_skips_removed_packages() {
        let output = "installed\ninstalled\nconfig-files\ninstalled\n";

        assert_eq!(AptBackend::parse_installed(output), 3);
    }

    #[test]
    fn test_parse_policy() {
        let repos = AptBackend::parse_policy(POLICY_OUTPUT).unwrap();

        assert_eq!(
            repos,
            vec![
                "http://security.debian.org/debian-security bookworm-security/main",
                "http://deb.debian.org/debian bookworm/main",
            ]
        );
    }

    #[test]
    fn test_parse_policy_rejects_unexpected_output() {
        assert!(AptBackend::parse_policy("E: something went wrong\n").is_err());
    }

    #[tokio::test]
    async fn test_queries_through_runner() {
        let runner = ScriptedRunner::default()
            .with(LIST_UPGRADABLE, 0, "Listing... Done\nvim/now 2 amd64 [upgradable from: 1]\n")
            .with(INSTALLED_STATUS, 0, "installed\ninstalled\n")
            .with(POLICY, 0, POLICY_OUTPUT);
        let apt = AptBackend::new(Arc::new(runner));

        assert_eq!(apt.count_upgradable().await.unwrap(), 1);
        assert_eq!(apt.count_installed().await.unwrap(), 2);
        assert_eq!(apt.enabled_repositories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_command() {
        let runner = ScriptedRunner::default().with(LIST_UPGRADABLE, 100, "");
        let apt = AptBackend::new(Arc::new(runner));

        let err = apt.count_upgradable().await.unwrap_err();
        assert!(matches!(err, PackageError::CommandFailed { status: 100, .. }));
    }

    #[tokio::test]
    async fn test_availability() {
        let present = ScriptedRunner::default()
            .with("command -v apt", 0, "/usr/bin/apt\n")
            .with("command -v dpkg-query", 0, "/usr/bin/dpkg-query\n");
        assert!(AptBackend::new(Arc::new(present)).is_available().await);

        let absent = ScriptedRunner::default();
        assert!(!AptBackend::new(Arc::new(absent)).is_available().await);
    }
}
