//! Status-Anzeige
//!
//! Die Session meldet nur drei Dinge: Verbindungsaufbau, verbunden (mit
//! Disconnect-Control) und Fehler. Wie das dargestellt wird entscheidet die
//! `StatusSink` Implementierung.

use parking_lot::Mutex;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::Notify;

pub const CONNECTING_TEXT: &str = "Connecting...";
pub const CONNECTED_TEXT: &str = "Connected ";

/// Löst den Disconnect der zugehörigen Session aus
#[derive(Debug, Clone)]
pub struct DisconnectHandle(Arc<Notify>);

impl DisconnectHandle {
    pub(crate) fn new(notify: Arc<Notify>) -> Self {
        Self(notify)
    }

    /// Schließt die Control-Connection und stoppt alle lokalen Tracks
    pub fn disconnect(&self) {
        self.0.notify_one();
    }
}

/// Empfänger für Statusänderungen
pub trait StatusSink: Send + Sync {
    /// Neuer Verbindungsversuch läuft
    fn connecting(&self);

    /// Peer Connection ist "connected", höchstens einmal pro Versuch
    fn connected(&self, disconnect: DisconnectHandle);

    /// Versuch ist an einem Media- oder Negotiation-Fehler gescheitert
    fn failed(&self, reason: &str);
}

// ============================================================================
// CONSOLE STATUS
// ============================================================================

/// Schreibt den Status auf stdout, Enter löst den Disconnect aus
#[derive(Debug, Default)]
pub struct ConsoleStatus {
    current: Mutex<Option<DisconnectHandle>>,
}

impl ConsoleStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wird von der Eingabe aufgerufen, `false` wenn nichts verbunden ist
    pub fn request_disconnect(&self) -> bool {
        match self.current.lock().take() {
            Some(handle) => {
                handle.disconnect();
                true
            }
            None => false,
        }
    }

    /// Blockiert auf `input`, jede Zeile löst den Disconnect aus
    ///
    /// Liefert die Anzahl der ausgelösten Disconnects, sobald `input` endet.
    pub fn read_disconnect_input<R: BufRead>(&self, input: R) -> usize {
        let mut requested = 0;
        for line in input.lines() {
            if line.is_err() {
                break;
            }
            if self.request_disconnect() {
                requested += 1;
            } else {
                tracing::info!("Not connected, nothing to disconnect");
            }
        }
        requested
    }

    pub fn render_connected() -> String {
        format!("{}[press Enter to disconnect]", CONNECTED_TEXT)
    }
}

impl StatusSink for ConsoleStatus {
    fn connecting(&self) {
        *self.current.lock() = None;
        println!("{}", CONNECTING_TEXT);
    }

    fn connected(&self, disconnect: DisconnectHandle) {
        *self.current.lock() = Some(disconnect);
        println!("{}", Self::render_connected());
    }

    fn failed(&self, reason: &str) {
        *self.current.lock() = None;
        println!("Connection failed: {}", reason);
    }
}
