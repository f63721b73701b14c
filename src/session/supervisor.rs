//! Reconnect-Schleife
//!
//! Jeder Versuch läuft komplett durch (verbinden → Session → aufräumen),
//! danach wird nach einer festen Pause neu begonnen. Kein Backoff, kein Limit.

use super::attempt::{Session, SessionEnd, SessionError};
use super::status::StatusSink;
use crate::media::{MediaConstraints, MediaSource};
use crate::peer::PeerFactory;
use crate::signaling::{Connector, SignalingLink};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Ergebnis eines einzelnen Versuchs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Control-Connection ging gar nicht erst auf
    ConnectFailed(String),

    /// Session lief und wurde regulär beendet
    Ended(SessionEnd),

    /// Media oder Negotiation ist gescheitert
    Failed(String),
}

pub struct Supervisor {
    connector: Arc<dyn Connector>,
    media: Arc<dyn MediaSource>,
    peers: Arc<dyn PeerFactory>,
    status: Arc<dyn StatusSink>,
    constraints: MediaConstraints,
    retry_delay: Duration,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        media: Arc<dyn MediaSource>,
        peers: Arc<dyn PeerFactory>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            connector,
            media,
            peers,
            status,
            constraints: MediaConstraints::default(),
            retry_delay: Duration::from_millis(crate::config::DEFAULT_RETRY_DELAY_MS),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Läuft für immer
    pub async fn run(&self) {
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            let outcome = self
                .run_attempt(attempt)
                .instrument(tracing::info_span!("attempt", n = attempt))
                .await;

            tracing::info!(
                "Attempt {} finished ({:?}), reconnecting in {:?}",
                attempt,
                outcome,
                self.retry_delay
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Läuft bis `shutdown` fertig ist
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) {
        tokio::select! {
            _ = self.run() => {}
            _ = shutdown => tracing::info!("Shutting down"),
        }
    }

    /// Ein vollständiger Versuch inklusive Aufräumen
    pub async fn run_attempt(&self, attempt: u64) -> AttemptOutcome {
        self.status.connecting();

        let link = match self.connector.connect().await {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!("Signaling connection failed: {}", e);
                return AttemptOutcome::ConnectFailed(e.to_string());
            }
        };

        match self.start_session(attempt, link).await {
            Ok(end) => AttemptOutcome::Ended(end),
            Err(e) => {
                tracing::error!("Connection attempt failed: {}", e);
                self.status.failed(&e.to_string());
                AttemptOutcome::Failed(e.to_string())
            }
        }
    }

    /// Media holen, Peer Connection bauen, Session fahren
    ///
    /// Schlägt ein Schritt vor der Session fehl, wird der Link gedroppt und
    /// damit geschlossen.
    async fn start_session(
        &self,
        attempt: u64,
        link: SignalingLink,
    ) -> Result<SessionEnd, SessionError> {
        let stream = self.media.acquire(&self.constraints).await?;
        let peer = self.peers.create().await?;

        Session::new(attempt, link, peer, stream, Arc::clone(&self.status))
            .run()
            .await
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("constraints", &self.constraints)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}
