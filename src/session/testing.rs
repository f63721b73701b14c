//! Test-Doubles für Session und Supervisor

use super::status::{DisconnectHandle, StatusSink};
use crate::media::{LocalStream, MediaConstraints, MediaError, MediaSource};
use crate::peer::{PeerError, PeerEvent, PeerFactory, PeerHandle, PeerTransport};
use crate::signaling::{Connector, LinkRemote, Outgoing, SignalingError, SignalingLink};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

pub const FAKE_OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\n";

pub fn candidate(value: &str) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: value.to_string(),
        ..Default::default()
    }
}

pub fn answer(sdp: &str) -> RTCSessionDescription {
    serde_json::from_value(json!({ "type": "answer", "sdp": sdp })).unwrap()
}

pub fn fake_stream() -> LocalStream {
    let track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: "video/VP8".to_string(),
            ..Default::default()
        },
        "video".to_string(),
        "fake".to_string(),
    ));
    LocalStream::new("fake", vec![track])
}

/// Wartet kooperativ bis `cond` erfüllt ist
pub async fn wait_until<F: Fn() -> bool>(cond: F) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

// ============================================================================
// PEER
// ============================================================================

#[derive(Default)]
pub struct FakePeer {
    fail_offer: bool,
    reject_answers: bool,
    tracks: AtomicUsize,
    local: Mutex<Vec<String>>,
    remote: Mutex<Vec<String>>,
    candidates: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl FakePeer {
    pub fn new() -> (Arc<Self>, PeerHandle, mpsc::UnboundedSender<PeerEvent>) {
        Self::build(Self::default())
    }

    pub fn failing_offer() -> (Arc<Self>, PeerHandle, mpsc::UnboundedSender<PeerEvent>) {
        Self::build(Self {
            fail_offer: true,
            ..Self::default()
        })
    }

    pub fn rejecting_answers() -> (Arc<Self>, PeerHandle, mpsc::UnboundedSender<PeerEvent>) {
        Self::build(Self {
            reject_answers: true,
            ..Self::default()
        })
    }

    fn build(peer: Self) -> (Arc<Self>, PeerHandle, mpsc::UnboundedSender<PeerEvent>) {
        let peer = Arc::new(peer);
        let (tx, events) = mpsc::unbounded_channel();
        let handle = PeerHandle {
            transport: Arc::clone(&peer) as Arc<dyn PeerTransport>,
            events,
        };
        (peer, handle, tx)
    }

    pub fn tracks_added(&self) -> usize {
        self.tracks.load(Ordering::SeqCst)
    }

    pub fn local_descriptions(&self) -> Vec<String> {
        self.local.lock().clone()
    }

    pub fn remote_descriptions(&self) -> Vec<String> {
        self.remote.lock().clone()
    }

    pub fn remote_candidates(&self) -> Vec<String> {
        self.candidates.lock().clone()
    }

    /// Remote Description und Candidates in Aufrufreihenfolge
    pub fn remote_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerTransport for FakePeer {
    async fn add_track(&self, _track: Arc<dyn TrackLocal + Send + Sync>) -> Result<(), PeerError> {
        self.tracks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_offer(&self) -> Result<RTCSessionDescription, PeerError> {
        if self.fail_offer {
            return Err(PeerError::WebRTC("offer failed".to_string()));
        }
        Ok(serde_json::from_value(json!({ "type": "offer", "sdp": FAKE_OFFER_SDP })).unwrap())
    }

    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError> {
        self.local.lock().push(desc.sdp);
        Ok(())
    }

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError> {
        if self.reject_answers {
            return Err(PeerError::InvalidSdp(desc.sdp));
        }
        self.calls.lock().push(format!("answer:{}", desc.sdp));
        self.remote.lock().push(desc.sdp);
        Ok(())
    }

    /// Lehnt wie webrtc-rs Candidates ohne Remote Description ab
    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), PeerError> {
        self.calls
            .lock()
            .push(format!("candidate:{}", candidate.candidate));
        if self.remote.lock().is_empty() {
            return Err(PeerError::WebRTC("remote description is not set".to_string()));
        }
        self.candidates.lock().push(candidate.candidate);
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Liefert pro `create` einen neuen `FakePeer`
#[derive(Default)]
pub struct FakePeerFactory {
    pub created: Mutex<Vec<(Arc<FakePeer>, mpsc::UnboundedSender<PeerEvent>)>>,
}

#[async_trait]
impl PeerFactory for FakePeerFactory {
    async fn create(&self) -> Result<PeerHandle, PeerError> {
        let (peer, handle, tx) = FakePeer::new();
        self.created.lock().push((peer, tx));
        Ok(handle)
    }
}

// ============================================================================
// MEDIA
// ============================================================================

#[derive(Default)]
pub struct FakeMedia {
    pub fail: bool,
    pub acquired: AtomicUsize,
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn acquire(&self, _constraints: &MediaConstraints) -> Result<LocalStream, MediaError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MediaError::NoVideoRequested);
        }
        Ok(fake_stream())
    }
}

// ============================================================================
// SIGNALING
// ============================================================================

/// Verhalten des `FakeConnector` pro Verbindungsversuch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Verbindung schlägt fehl
    Refuse,
    /// Verbindung geht auf und wird sofort vom Server geschlossen
    OpenThenClose,
    /// Verbindung bleibt offen, die Gegenstelle wird aufbewahrt
    Open,
}

pub struct FakeConnector {
    behavior: ConnectBehavior,
    pub attempts: AtomicUsize,
    pub remotes: Mutex<Vec<LinkRemote>>,
    pub closed_outgoing: Mutex<Vec<mpsc::Receiver<Outgoing>>>,
}

impl FakeConnector {
    pub fn new(behavior: ConnectBehavior) -> Self {
        Self {
            behavior,
            attempts: AtomicUsize::new(0),
            remotes: Mutex::new(Vec::new()),
            closed_outgoing: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<SignalingLink, SignalingError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ConnectBehavior::Refuse => Err(SignalingError::ConnectionFailed("refused".to_string())),
            ConnectBehavior::OpenThenClose => {
                let (link, remote) = SignalingLink::in_memory();
                // Ausgehende Seite bleibt lesbar, eingehende ist sofort zu
                self.closed_outgoing.lock().push(remote.outgoing);
                Ok(link)
            }
            ConnectBehavior::Open => {
                let (link, remote) = SignalingLink::in_memory();
                self.remotes.lock().push(remote);
                Ok(link)
            }
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone)]
pub enum StatusEvent {
    Connecting,
    Connected,
    Failed(String),
}

#[derive(Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<StatusEvent>>,
    handle: Mutex<Option<DisconnectHandle>>,
}

impl RecordingStatus {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    pub fn connecting_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, StatusEvent::Connecting))
            .count()
    }

    pub fn connected_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, StatusEvent::Connected))
            .count()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::Failed(reason) => Some(reason),
                _ => None,
            })
            .collect()
    }

    pub fn last_handle(&self) -> Option<DisconnectHandle> {
        self.handle.lock().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn connecting(&self) {
        self.events.lock().push(StatusEvent::Connecting);
    }

    fn connected(&self, disconnect: DisconnectHandle) {
        self.events.lock().push(StatusEvent::Connected);
        *self.handle.lock() = Some(disconnect);
    }

    fn failed(&self, reason: &str) {
        self.events.lock().push(StatusEvent::Failed(reason.to_string()));
    }
}
