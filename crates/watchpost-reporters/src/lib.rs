//! watchpost-reporters: Local host and bundled reporters
//!
//! `LocalHost` is the machine the agent runs on. The reporter factories here
//! only apply to it:
//! - `packages`: package inventory from apt or dnf/yum
//! - `syslogsocket`: syslog datagrams taken over from the journal's socket

pub mod error;
pub mod exec;
pub mod host;
pub mod packages;
pub mod syslog;

pub use error::{ExecError, PackageError};
pub use exec::{CommandOutput, CommandRunner, LocalRunner};
pub use host::LocalHost;
pub use packages::{PackageBackend, PackagesFactory, PackagesReporter};
pub use syslog::{SyslogFactory, SyslogReporter};
