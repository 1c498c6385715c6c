//! Credential lifecycle
//!
//! A run starts from whatever credential is on disk. If there is none, the
//! externally supplied bootstrap pair is used; its subject is the
//! provisioning sentinel. A provisioning credential close to expiry is
//! exchanged for an issued one over the existing connection, and every run
//! is scheduled to end ahead of expiry so the supervisor restarts it.

mod credential;
mod issuance;
mod storage;

pub use credential::{ChannelConfig, Credential, CredentialState, PROVISIONING_SUBJECT, TrustPool};
pub use issuance::CertificateManager;
pub use storage::install_credential;
