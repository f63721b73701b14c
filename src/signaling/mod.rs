//! Signaling Module - WebSocket Control-Connection
//!
//! Dieses Modul verwaltet die Kommunikation mit dem Signaling-Server:
//! - WebSocket-Verbindung aufbauen
//! - `{type, data}` Envelopes senden
//! - Eingehende Envelopes parsen und weiterleiten

mod client;
mod messages;

pub use client::{Connector, LinkRemote, Outgoing, SignalingClient, SignalingError, SignalingLink};
pub use messages::*;
