//! Session orchestrator
//!
//! One session owns one collector connection and drives three things
//! against it: the report ticker, the log relay, and the rotation countdown.
//! A session runs once. When it ends, for rotation or on error, the caller
//! builds a fresh one (usually by restarting the process).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument};

use crate::config::SessionSettings;
use crate::error::AgentError;
use crate::model::{Host, LogLineStream};
use crate::queue::{LogQueueReceiver, LogQueueSender, log_queue};
use crate::transport::CollectorConnection;
use crate::wire;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Handshaking,
    Running,
    Terminating,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Handshaking => write!(f, "handshaking"),
            SessionState::Running => write!(f, "running"),
            SessionState::Terminating => write!(f, "terminating"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Credential rotation is due; restart the agent
    ExitingForRotation,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::ExitingForRotation => {
                write!(f, "exiting to allow certificate rotation")
            }
        }
    }
}

/// A single run against one collector connection
pub struct Session {
    connection: Arc<dyn CollectorConnection>,
    host: Arc<dyn Host>,
    rotate_at: DateTime<Utc>,
    settings: SessionSettings,
    state: SessionState,
}

impl Session {
    /// New idle session; `run` performs the handshake if it has not happened
    #[must_use]
    pub fn new(
        connection: Arc<dyn CollectorConnection>,
        host: Arc<dyn Host>,
        rotate_at: DateTime<Utc>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            connection,
            host,
            rotate_at,
            settings,
            state: SessionState::Idle,
        }
    }

    /// New session that has completed `ConfigureMe`
    ///
    /// # Errors
    /// Returns the handshake failure; the session is not usable after it.
    pub async fn establish(
        connection: Arc<dyn CollectorConnection>,
        host: Arc<dyn Host>,
        rotate_at: DateTime<Utc>,
        settings: SessionSettings,
    ) -> Result<Self, AgentError> {
        let mut session = Self::new(connection, host, rotate_at, settings);
        session.handshake().await?;
        Ok(session)
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn rotate_at(&self) -> DateTime<Utc> {
        self.rotate_at
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    /// Send `ConfigureMe` with the host snapshot
    ///
    /// # Errors
    /// Any failure is fatal to the session.
    pub async fn handshake(&mut self) -> Result<(), AgentError> {
        self.transition(SessionState::Handshaking);

        match self.configure().await {
            Ok(()) => {
                info!(host = %self.host.id(), "collector configured");
                self.transition(SessionState::Running);
                Ok(())
            }
            Err(e) => {
                error!(host = %self.host.id(), error = %e, "handshake failed");
                self.transition(SessionState::Stopped);
                Err(e)
            }
        }
    }

    async fn configure(&self) -> Result<(), AgentError> {
        let host = wire::host_to_wire(self.host.as_ref())?;
        self.connection.configure_me(host).await?;
        Ok(())
    }

    /// Build and send one full snapshot
    ///
    /// # Errors
    /// Host, reporter and transport failures propagate; `success = false` becomes
    /// `AgentError::Protocol`.
    #[instrument(skip(self), fields(host = %self.host.id()))]
    pub async fn tick(&self) -> Result<(), AgentError> {
        let reporters = self.host.reporters();
        let request = wire::report_request(self.host.as_ref(), &reporters).await?;

        debug!(reporters = request.reporters.len(), "sending report");
        let response = self.connection.report(request).await?;

        if !response.success {
            return Err(AgentError::Protocol("collector rejected report".into()));
        }
        info!("report accepted");
        Ok(())
    }

    /// Run until rotation is due or something fails
    ///
    /// Ticks once immediately, then starts the log relay and the rotation
    /// countdown and ticks every `report_interval`. Either way out closes
    /// the log queue.
    ///
    /// # Errors
    /// Returns the first handshake or tick failure. A session that is not
    /// `Idle` or `Running` fails with `AgentError::NotRunnable` before
    /// sending anything.
    pub async fn run(mut self) -> Result<RunOutcome, AgentError> {
        match self.state {
            SessionState::Idle => self.handshake().await?,
            SessionState::Running => {}
            other => return Err(AgentError::NotRunnable(other.to_string())),
        }

        if let Err(e) = self.tick().await {
            error!(error = %e, "initial tick failed");
            self.transition(SessionState::Terminating);
            self.transition(SessionState::Stopped);
            return Err(e);
        }

        let wait = (self.rotate_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        info!(rotate_at = %self.rotate_at, sleep_secs = wait.as_secs(), "rotation countdown started");
        let rotation = tokio::time::sleep(wait);
        tokio::pin!(rotation);

        let (sender, receiver, closer) = log_queue(self.settings.log_queue_capacity);
        tokio::spawn(relay(self.connection.clone(), receiver));
        for reporter in self.host.reporters() {
            if let Some(stream) = reporter.take_log_lines() {
                tokio::spawn(drain(reporter.id().to_string(), stream, sender.clone()));
            }
        }
        drop(sender);

        let period = self.settings.report_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                biased;
                () = &mut rotation => {
                    info!(rotate_at = %self.rotate_at, "rotation due");
                    break Ok(RunOutcome::ExitingForRotation);
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "tick failed");
                        break Err(e);
                    }
                }
            }
        };

        self.transition(SessionState::Terminating);
        closer.close();
        self.transition(SessionState::Stopped);
        outcome
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host.id())
            .field("rotate_at", &self.rotate_at)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Forward one reporter's lines into the shared queue, in order
async fn drain(reporter: String, mut stream: LogLineStream, sender: LogQueueSender) {
    debug!(reporter = %reporter, "log drain started");
    loop {
        tokio::select! {
            biased;
            () = sender.closed() => break,
            next = stream.next() => match next {
                Some(line) => {
                    if sender.send(line).await.is_err() {
                        break;
                    }
                }
                None => {
                    info!(reporter = %reporter, "log stream ended");
                    break;
                }
            },
        }
    }
    debug!(reporter = %reporter, "log drain stopped");
}

/// Move lines from the queue onto the collector's log stream, one at a time
async fn relay(connection: Arc<dyn CollectorConnection>, mut receiver: LogQueueReceiver) {
    let mut sink = match connection.record_logs().await {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "failed to open log stream, log relay stopped");
            return;
        }
    };

    let mut forwarded: u64 = 0;
    while let Some(line) = receiver.recv().await {
        if let Err(e) = sink.send(wire::log_line_to_wire(line)).await {
            error!(error = %e, forwarded, "failed to send log line, log relay stopped");
            return;
        }
        forwarded += 1;
    }
    debug!(forwarded, "log relay finished");
}
