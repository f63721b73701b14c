//! Send Video - WebRTC Video-Sender
//!
//! Schickt einen lokalen Video-Track an einen Signaling-Server:
//! - WebSocket als Control-Connection (`{type, data}` Envelopes)
//! - WebRTC Offer/Answer und ICE Candidate Austausch
//! - IVF-Datei (VP8/VP9, 416×416) als Video-Quelle
//! - Automatischer Reconnect nach 500ms, ohne Limit

pub mod config;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;

use anyhow::Context;
use config::Config;
use media::{IvfVideoSource, MediaConstraints};
use peer::WebRtcPeerFactory;
use session::{ConsoleStatus, Supervisor};
use signaling::SignalingClient;
use std::sync::Arc;
use std::time::Duration;

/// Wie lange laufende Tasks beim Beenden noch Zeit bekommen
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// LOGGING
// ============================================================================

/// Initialisiert tracing, `RUST_LOG` hat Vorrang
fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("send_video_lib=debug".parse()?)
                .add_directive("webrtc=warn".parse()?),
        )
        .init();
    Ok(())
}

// ============================================================================
// APP RUNNER
// ============================================================================

/// Baut den Supervisor aus der Konfiguration
pub fn build_supervisor(config: &Config, status: Arc<ConsoleStatus>) -> anyhow::Result<Supervisor> {
    let url = config.signaling_url()?;

    let supervisor = Supervisor::new(
        Arc::new(SignalingClient::new(url)),
        Arc::new(IvfVideoSource::new(config.media.video_file.clone())),
        Arc::new(WebRtcPeerFactory::new(peer::ice_servers(&config.ice.stun_url))),
        status,
    )
    .with_constraints(MediaConstraints::video_only(
        config.media.width,
        config.media.height,
    ))
    .with_retry_delay(config.retry_delay());

    Ok(supervisor)
}

/// Liest stdin auf einem eigenen OS-Thread, jedes Enter löst den Disconnect aus
fn spawn_disconnect_input(status: Arc<ConsoleStatus>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("disconnect-input".to_string())
        .spawn(move || {
            status.read_disconnect_input(std::io::stdin().lock());
            tracing::debug!("stdin closed, disconnect input stopped");
        })?;
    Ok(())
}

/// Startet den Sender und läuft bis Ctrl-C
pub fn run() -> anyhow::Result<()> {
    init_tracing()?;

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Starting send-video: signaling {}, video {:?}",
        config.signaling_url()?,
        config.media.video_file
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let status = Arc::new(ConsoleStatus::new());
        let supervisor = build_supervisor(&config, Arc::clone(&status))?;
        spawn_disconnect_input(status)?;

        supervisor
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;

        Ok::<_, anyhow::Error>(())
    })?;

    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    Ok(())
}
