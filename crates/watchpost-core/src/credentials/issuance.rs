//! Certificate manager: load, renew, schedule rotation

use chrono::{DateTime, Utc};
use rcgen::{CertificateParams, DistinguishedName, DnType, DnValue, KeyPair};
use tracing::{debug, info, instrument};
use watchpost_api::SigningRequest;

use crate::config::{CredentialPaths, CredentialPolicy};
use crate::credentials::credential::{ChannelConfig, Credential, TrustPool};
use crate::credentials::storage::install_credential;
use crate::error::AgentError;
use crate::model::Host;
use crate::transport::CollectorConnection;

/// Owns the credential files and the policy applied to them
///
/// Never touches a live connection: a renewed credential comes back as a new
/// `ChannelConfig` and the caller swaps connections.
#[derive(Debug, Clone)]
pub struct CertificateManager {
    paths: CredentialPaths,
    trust_pool: TrustPool,
    policy: CredentialPolicy,
}

impl CertificateManager {
    #[must_use]
    pub fn new(paths: CredentialPaths, trust_pool: TrustPool, policy: CredentialPolicy) -> Self {
        Self {
            paths,
            trust_pool,
            policy,
        }
    }

    /// Load the trust pool from `paths.ca` and build a manager
    ///
    /// # Errors
    /// Returns an error if the trust pool cannot be read or holds no
    /// certificates.
    pub async fn open(paths: CredentialPaths, policy: CredentialPolicy) -> Result<Self, AgentError> {
        let trust_pool = TrustPool::load(&paths.ca).await?;
        info!(ca = %paths.ca.display(), certificates = trust_pool.len(), "loaded trust pool");
        Ok(Self::new(paths, trust_pool, policy))
    }

    #[must_use]
    pub fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    #[must_use]
    pub fn trust_pool(&self) -> &TrustPool {
        &self.trust_pool
    }

    #[must_use]
    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// The credential this run starts with
    ///
    /// The on-disk pair if the certificate file exists, otherwise the
    /// bootstrap pair.
    ///
    /// # Errors
    /// Returns an error if the chosen pair cannot be read or parsed.
    pub async fn load_active(&self) -> Result<Credential, AgentError> {
        let on_disk = tokio::fs::try_exists(&self.paths.cert)
            .await
            .map_err(|e| {
                AgentError::Storage(format!(
                    "failed to check {}: {e}",
                    self.paths.cert.display()
                ))
            })?;

        let credential = if on_disk {
            Credential::load(&self.paths.cert, &self.paths.key).await?
        } else {
            info!(
                cert = %self.paths.cert.display(),
                bootstrap = %self.paths.bootstrap_cert.display(),
                "no local credential, using bootstrap credential"
            );
            Credential::load(&self.paths.bootstrap_cert, &self.paths.bootstrap_key).await?
        };

        info!(
            subject = %credential.subject(),
            state = ?credential.state(),
            not_after = %credential.not_after(),
            "loaded credential"
        );
        Ok(credential)
    }

    /// Channel configuration for `credential` against this trust pool
    #[must_use]
    pub fn channel_config(&self, credential: Credential) -> ChannelConfig {
        ChannelConfig::new(self.trust_pool.clone(), credential)
    }

    /// Expiry falls inside the renewal window
    #[must_use]
    pub fn renewal_due(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        credential.not_after() < now + self.policy.renewal_window
    }

    /// Issuance guard: provisioning credential that is due for renewal
    ///
    /// An issued credential is never renewed here however close it is to
    /// expiry; only the rotation exit brings it back around.
    #[must_use]
    pub fn should_issue(&self, credential: &Credential, now: DateTime<Utc>) -> bool {
        credential.is_provisioning() && self.renewal_due(credential, now)
    }

    /// When the current run must end for rotation
    #[must_use]
    pub fn rotation_wake_time(&self, credential: &Credential) -> DateTime<Utc> {
        credential.not_after() - self.policy.rotation_lead
    }

    /// Obtain and install an issued credential if the guard allows
    ///
    /// Generates a key pair, asks the collector to sign a request for the
    /// host's name over `connection`, installs the result, and returns the
    /// channel configuration for it. Returns `None` when nothing was done.
    ///
    /// # Errors
    /// `AgentError::Protocol` if the collector's certificate is unusable,
    /// `AgentError::Storage` if the pair cannot be installed, or whatever
    /// the signing call fails with. Nothing is written on failure.
    #[instrument(skip_all, fields(subject = %credential.subject()))]
    pub async fn issue_if_needed(
        &self,
        credential: &Credential,
        host: &dyn Host,
        connection: &dyn CollectorConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<ChannelConfig>, AgentError> {
        if !self.should_issue(credential, now) {
            debug!(
                state = ?credential.state(),
                not_after = %credential.not_after(),
                "certificate issuance not needed"
            );
            return Ok(None);
        }

        let name = host.human_name()?;
        info!(host = %host.id(), name = %name, "requesting certificate");

        let key_pair = KeyPair::generate()
            .map_err(|e| AgentError::Credential(format!("failed to generate key pair: {e}")))?;
        let csr = signing_request(&name, &key_pair)?;

        let response = connection.sign_me(SigningRequest { csr }).await?;

        let issued = Credential::from_pem(response.cert, key_pair.serialize_pem()).map_err(|e| {
            AgentError::Protocol(format!("collector returned an unusable certificate: {e}"))
        })?;
        if issued.public_key() != key_pair.public_key_raw() {
            return Err(AgentError::Protocol(
                "signed certificate does not match the requested key".into(),
            ));
        }

        install_credential(
            &self.paths.cert,
            &self.paths.key,
            issued.cert_pem(),
            issued.key_pem(),
        )
        .await?;

        info!(
            subject = %issued.subject(),
            not_after = %issued.not_after(),
            "installed issued certificate"
        );
        Ok(Some(self.channel_config(issued)))
    }
}

/// PEM CSR with `name` as both common name and DNS name
fn signing_request(name: &str, key_pair: &KeyPair) -> Result<String, AgentError> {
    let mut params = CertificateParams::new(vec![name.to_string()])
        .map_err(|e| AgentError::Credential(format!("invalid host name {name:?}: {e}")))?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(name.to_string()));
    params.distinguished_name = dn;

    params
        .serialize_request(key_pair)
        .and_then(|csr| csr.pem())
        .map_err(|e| AgentError::Credential(format!("failed to build signing request: {e}")))
}
