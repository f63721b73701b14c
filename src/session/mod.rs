//! Session Module - Verbindungsversuche und Reconnect
//!
//! Dieses Modul verwaltet:
//! - Eine `Session` pro Verbindungsversuch (Offer/Answer, ICE, Disconnect)
//! - Die Status-Anzeige
//! - Den `Supervisor`, der nach jedem Close neu verbindet

mod attempt;
mod status;
mod supervisor;

#[cfg(test)]
mod testing;

pub use attempt::{Session, SessionEnd, SessionError};
pub use status::{ConsoleStatus, DisconnectHandle, StatusSink, CONNECTED_TEXT, CONNECTING_TEXT};
pub use supervisor::{AttemptOutcome, Supervisor};
