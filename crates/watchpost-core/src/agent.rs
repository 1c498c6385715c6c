//! Agent startup sequence

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::config::SessionSettings;
use crate::credentials::CertificateManager;
use crate::error::AgentError;
use crate::model::Host;
use crate::session::{RunOutcome, Session};
use crate::transport::Connector;

/// Wires credentials, connector, and host into a running session
pub struct Agent {
    connector: Arc<dyn Connector>,
    certificates: CertificateManager,
    host: Arc<dyn Host>,
    settings: SessionSettings,
}

impl Agent {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        certificates: CertificateManager,
        host: Arc<dyn Host>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            connector,
            certificates,
            host,
            settings,
        }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// Connect, renew the credential if the guard allows, and handshake
    ///
    /// When a new credential is issued the first connection is closed and a
    /// second one is opened with it before the handshake, so the session
    /// never sees the provisioning identity.
    ///
    /// # Errors
    /// Any credential, connection, or handshake failure.
    #[instrument(skip(self), fields(host = %self.host.id()))]
    pub async fn start(&self) -> Result<Session, AgentError> {
        let mut credential = self.certificates.load_active().await?;
        let mut connection = self
            .connector
            .connect(&self.certificates.channel_config(credential.clone()))
            .await?;

        let issued = self
            .certificates
            .issue_if_needed(
                &credential,
                self.host.as_ref(),
                connection.as_ref(),
                Utc::now(),
            )
            .await;
        let issued = match issued {
            Ok(issued) => issued,
            Err(e) => {
                if let Err(close_err) = connection.close().await {
                    warn!(error = %close_err, "failed to close connection after failed issuance");
                }
                return Err(e);
            }
        };

        if let Some(config) = issued {
            info!(subject = %config.credential().subject(), "reconnecting with issued credential");
            if let Err(e) = connection.close().await {
                warn!(error = %e, "failed to close provisioning connection");
            }
            connection = self.connector.connect(&config).await?;
            credential = config.credential().clone();
        }

        let rotate_at = self.certificates.rotation_wake_time(&credential);
        Session::establish(
            connection,
            self.host.clone(),
            rotate_at,
            self.settings.clone(),
        )
        .await
    }

    /// `start` followed by `Session::run`
    ///
    /// # Errors
    /// Whatever ended the run, other than rotation.
    pub async fn run(&self) -> Result<RunOutcome, AgentError> {
        self.start().await?.run().await
    }
}
