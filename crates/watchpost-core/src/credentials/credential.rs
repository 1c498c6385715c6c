//! Parsed credentials and trust pools

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use x509_parser::pem::{Pem, parse_x509_pem};

use crate::error::AgentError;

/// Subject common name of the bootstrap credential
pub const PROVISIONING_SUBJECT: &str = "Watchpost Provisioning Certificate";

/// Lifecycle state, derived from the subject name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Bootstrap identity, only good for obtaining a real one
    Provisioning,
    /// Identity issued by the collector
    Issued,
}

/// A client certificate and its private key
#[derive(Clone)]
pub struct Credential {
    cert_pem: String,
    key_pem: String,
    subject: String,
    not_after: DateTime<Utc>,
    public_key: Vec<u8>,
}

impl Credential {
    /// Parse a certificate chain (leaf first) and its private key
    ///
    /// # Errors
    /// Returns `AgentError::Credential` if the leaf certificate cannot be
    /// parsed or the key PEM holds no private key.
    pub fn from_pem(
        cert_pem: impl Into<String>,
        key_pem: impl Into<String>,
    ) -> Result<Self, AgentError> {
        let cert_pem = cert_pem.into();
        let key_pem = key_pem.into();

        let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| AgentError::Credential(format!("certificate is not PEM: {e}")))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| AgentError::Credential(format!("invalid certificate: {e}")))?;

        let subject = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| AgentError::Credential("certificate expiry out of range".into()))?;

        let public_key = cert.public_key().subject_public_key.data.to_vec();

        let has_key = Pem::iter_from_buffer(key_pem.as_bytes())
            .filter_map(Result::ok)
            .any(|p| p.label.ends_with("PRIVATE KEY"));
        if !has_key {
            return Err(AgentError::Credential("no private key found".into()));
        }

        Ok(Self {
            cert_pem,
            key_pem,
            subject,
            not_after,
            public_key,
        })
    }

    /// Read and parse a certificate/key file pair
    ///
    /// # Errors
    /// Returns `AgentError::Storage` if either file cannot be read, or
    /// `AgentError::Credential` if their contents are unusable.
    pub async fn load(cert_path: &Path, key_path: &Path) -> Result<Self, AgentError> {
        let cert_pem = read(cert_path).await?;
        let key_pem = read(key_path).await?;
        Self::from_pem(cert_pem, key_pem)
    }

    /// Leaf certificate common name
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    #[must_use]
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    #[must_use]
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Raw subject public key bits of the leaf
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    #[must_use]
    pub fn state(&self) -> CredentialState {
        if self.subject == PROVISIONING_SUBJECT {
            CredentialState::Provisioning
        } else {
            CredentialState::Issued
        }
    }

    #[must_use]
    pub fn is_provisioning(&self) -> bool {
        self.state() == CredentialState::Provisioning
    }

    /// Key followed by the certificate chain, as TLS client identities expect
    #[must_use]
    pub fn identity_pem(&self) -> String {
        let mut pem = String::with_capacity(self.key_pem.len() + self.cert_pem.len() + 1);
        pem.push_str(&self.key_pem);
        if !pem.ends_with('\n') {
            pem.push('\n');
        }
        pem.push_str(&self.cert_pem);
        pem
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &self.subject)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// CA certificates trusted for the collector
#[derive(Debug, Clone)]
pub struct TrustPool {
    pem: String,
    count: usize,
}

impl TrustPool {
    /// # Errors
    /// Returns `AgentError::Credential` if no certificate is found.
    pub fn from_pem(pem: impl Into<String>) -> Result<Self, AgentError> {
        let pem = pem.into();
        let count = Pem::iter_from_buffer(pem.as_bytes())
            .filter_map(Result::ok)
            .filter(|p| p.label == "CERTIFICATE" && p.parse_x509().is_ok())
            .count();

        if count == 0 {
            return Err(AgentError::Credential(
                "trust pool holds no certificates".into(),
            ));
        }

        Ok(Self { pem, count })
    }

    /// # Errors
    /// Returns `AgentError::Storage` if the file cannot be read.
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        Self::from_pem(read(path).await?)
    }

    #[must_use]
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Number of certificates in the pool
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Everything a connector needs to open an authenticated channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    trust_pool: TrustPool,
    credential: Credential,
}

impl ChannelConfig {
    #[must_use]
    pub fn new(trust_pool: TrustPool, credential: Credential) -> Self {
        Self {
            trust_pool,
            credential,
        }
    }

    #[must_use]
    pub fn trust_pool(&self) -> &TrustPool {
        &self.trust_pool
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

async fn read(path: &Path) -> Result<String, AgentError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AgentError::Storage(format!("failed to read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::credentials::testing::self_signed;

    #[test]
    fn test_parses_subject_and_expiry() {
        let expiry = Utc.with_ymd_and_hms(2031, 3, 14, 0, 0, 0).unwrap();
        let (cert, key) = self_signed("box.example", expiry);

        let credential = Credential::from_pem(cert, key).unwrap();

        assert_eq!(credential.subject(), "box.example");
        assert_eq!(credential.not_after(), expiry);
        assert_eq!(credential.state(), CredentialState::Issued);
        assert!(!credential.public_key().is_empty());
    }

    #[test]
    fn test_sentinel_subject_is_provisioning() {
        let (cert, key) = self_signed(PROVISIONING_SUBJECT, Utc::now() + Duration::days(10));

        let credential = Credential::from_pem(cert, key).unwrap();

        assert!(credential.is_provisioning());
    }

    #[test]
    fn test_rejects_garbage_certificate() {
        let (_, key) = self_signed("box.example", Utc::now() + Duration::days(10));

        let err = Credential::from_pem("not a certificate", key).unwrap_err();
        assert!(matches!(err, AgentError::Credential(_)));
    }

    #[test]
    fn test_rejects_missing_key() {
        let (cert, _) = self_signed("box.example", Utc::now() + Duration::days(10));

        let err = Credential::from_pem(cert.clone(), cert).unwrap_err();
        assert!(matches!(err, AgentError::Credential(_)));
    }

    #[test]
    fn test_identity_is_key_then_chain() {
        let (cert, key) = self_signed("box.example", Utc::now() + Duration::days(10));
        let credential = Credential::from_pem(cert.clone(), key.clone()).unwrap();

        let identity = credential.identity_pem();
        assert!(identity.starts_with(key.trim_end()));
        assert!(identity.ends_with(&cert));
    }

    #[test]
    fn test_debug_hides_key() {
        let (cert, key) = self_signed("box.example", Utc::now() + Duration::days(10));
        let credential = Credential::from_pem(cert, key).unwrap();

        assert!(!format!("{credential:?}").contains("PRIVATE KEY"));
    }

    #[test]
    fn test_trust_pool_counts_certificates() {
        let (a, _) = self_signed("ca-one", Utc::now() + Duration::days(365));
        let (b, _) = self_signed("ca-two", Utc::now() + Duration::days(365));

        let pool = TrustPool::from_pem(format!("{a}{b}")).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_empty_trust_pool_is_rejected() {
        assert!(TrustPool::from_pem("").is_err());
    }
}
