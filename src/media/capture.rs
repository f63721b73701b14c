//! Lokale Video-Quelle
//!
//! Liest vorab kodierte VP8/VP9 Frames aus einer IVF-Datei und schreibt sie
//! als Samples in einen `TrackLocalStaticSample`. Am Dateiende wird von vorne
//! begonnen, die Quelle verhält sich also wie eine Kamera.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use webrtc::api::media_engine::{MIME_TYPE_VP8, MIME_TYPE_VP9};
use webrtc::media::io::ivf_reader::{IVFFileHeader, IVFReader};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Fallback wenn die Timebase im Header unbrauchbar ist (~30fps)
const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(33);

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Audio capture is not supported")]
    AudioUnsupported,

    #[error("No video track requested")]
    NoVideoRequested,

    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid IVF file: {0}")]
    InvalidFile(String),

    #[error("Video loader failed: {0}")]
    Loader(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Video is {actual_width}x{actual_height}, expected {width}x{height}")]
    ConstraintMismatch {
        width: u16,
        height: u16,
        actual_width: u16,
        actual_height: u16,
    },
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    pub width: u16,
    pub height: u16,
}

/// Entspricht `{ video: {width, height}, audio: false }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl MediaConstraints {
    pub fn video_only(width: u16, height: u16) -> Self {
        Self {
            video: Some(VideoConstraints { width, height }),
            audio: false,
        }
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self::video_only(
            crate::config::DEFAULT_VIDEO_SIZE,
            crate::config::DEFAULT_VIDEO_SIZE,
        )
    }
}

// ============================================================================
// LOCAL STREAM
// ============================================================================

/// Erfasste lokale Tracks inklusive der Tasks die sie füttern
pub struct LocalStream {
    id: String,
    tracks: Vec<Arc<TrackLocalStaticSample>>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<TrackLocalStaticSample>>) -> Self {
        Self {
            id: id.into(),
            tracks,
            pumps: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    fn attach_pump(&self, pump: JoinHandle<()>) {
        self.pumps.lock().push(pump);
    }

    /// Alle Tracks in der Form die `add_track` erwartet
    pub fn tracks(&self) -> Vec<Arc<dyn TrackLocal + Send + Sync>> {
        self.tracks
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn TrackLocal + Send + Sync>)
            .collect()
    }

    /// Stoppt alle Tracks (idempotent)
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for pump in self.pumps.lock().drain(..) {
            pump.abort();
        }
        tracing::info!("Stopped {} local track(s) of stream {}", self.tracks.len(), self.id);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for LocalStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ============================================================================
// MEDIA SOURCE
// ============================================================================

/// Liefert lokale Medien passend zu den Constraints
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream, MediaError>;
}

/// Header-Informationen einer IVF-Datei
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfInfo {
    pub mime_type: &'static str,
    pub width: u16,
    pub height: u16,
    pub frame_duration: Duration,
}

impl IvfInfo {
    fn from_header(header: &IVFFileHeader) -> Result<Self, MediaError> {
        let mime_type = match &header.four_cc {
            b"VP80" => MIME_TYPE_VP8,
            b"VP90" => MIME_TYPE_VP9,
            other => {
                return Err(MediaError::UnsupportedCodec(
                    String::from_utf8_lossy(other).into_owned(),
                ))
            }
        };

        let millis = match header.timebase_denominator {
            0 => 0,
            den => (1000 * header.timebase_numerator as u64) / den as u64,
        };
        let frame_duration = if millis == 0 {
            DEFAULT_FRAME_DURATION
        } else {
            Duration::from_millis(millis)
        };

        Ok(Self {
            mime_type,
            width: header.width,
            height: header.height,
            frame_duration,
        })
    }
}

/// IVF-Datei als Video-Quelle
#[derive(Debug, Clone)]
pub struct IvfVideoSource {
    path: PathBuf,
}

impl IvfVideoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MediaSource for IvfVideoSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalStream, MediaError> {
        if constraints.audio {
            return Err(MediaError::AudioUnsupported);
        }
        let video = constraints.video.ok_or(MediaError::NoVideoRequested)?;

        // Datei-IO läuft nicht auf den Runtime-Workern
        let path = self.path.clone();
        let (info, frames) = tokio::task::spawn_blocking(move || load_ivf(&path))
            .await
            .map_err(|e| MediaError::Loader(e.to_string()))??;

        if info.width != video.width || info.height != video.height {
            return Err(MediaError::ConstraintMismatch {
                width: video.width,
                height: video.height,
                actual_width: info.width,
                actual_height: info.height,
            });
        }

        tracing::info!(
            "Acquired {} video {}x{} from {:?} ({} frames, {:?}/frame)",
            info.mime_type,
            info.width,
            info.height,
            self.path,
            frames.len(),
            info.frame_duration
        );

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: info.mime_type.to_string(),
                ..Default::default()
            },
            "video".to_string(),
            "send-video".to_string(),
        ));

        let stream = LocalStream::new("send-video", vec![Arc::clone(&track)]);
        stream.attach_pump(tokio::spawn(pump_frames(track, frames, info.frame_duration)));

        Ok(stream)
    }
}

/// Liest Header und alle Frames einer IVF-Datei (blockierend)
fn load_ivf(path: &Path) -> Result<(IvfInfo, Vec<Bytes>), MediaError> {
    let file = File::open(path).map_err(|source| MediaError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let (mut reader, header) = IVFReader::new(BufReader::new(file))
        .map_err(|e| MediaError::InvalidFile(e.to_string()))?;
    let info = IvfInfo::from_header(&header)?;

    let mut frames = Vec::new();
    while let Ok((frame, _)) = reader.parse_next_frame() {
        frames.push(frame.freeze());
    }
    if frames.is_empty() {
        return Err(MediaError::InvalidFile(format!("{:?} contains no frames", path)));
    }

    Ok((info, frames))
}

/// Ziel für kodierte Video-Samples
#[async_trait]
trait SampleSink: Send + Sync {
    async fn write(&self, sample: &Sample) -> Result<(), webrtc::Error>;
}

#[async_trait]
impl SampleSink for TrackLocalStaticSample {
    async fn write(&self, sample: &Sample) -> Result<(), webrtc::Error> {
        self.write_sample(sample).await
    }
}

/// Schreibt Frames im Takt der Timebase und beginnt am Ende von vorne
async fn pump_frames<S: SampleSink>(sink: Arc<S>, frames: Vec<Bytes>, frame_duration: Duration) {
    let mut ticker = tokio::time::interval(frame_duration);

    loop {
        for frame in &frames {
            ticker.tick().await;

            let sample = Sample {
                data: frame.clone(),
                duration: frame_duration,
                ..Default::default()
            };
            if let Err(e) = sink.write(&sample).await {
                tracing::warn!("Failed to write video sample: {}", e);
            }
        }
        tracing::debug!("Rewinding video after {} frames", frames.len());
    }
}
