//! Media Module - lokale Video-Quelle
//!
//! Ersetzt `getUserMedia`: liefert einen `LocalStream` mit genau einem
//! Video-Track (416×416, kein Audio).

mod capture;

pub use capture::{
    IvfInfo, IvfVideoSource, LocalStream, MediaConstraints, MediaError, MediaSource,
    VideoConstraints,
};
