//! Error types of the audio core.
//!
//! `AudioError` is recoverable and ends up as playback state plus a
//! `PlaybackEvent::Failed`; `GraphAttachError` is a contract violation and is
//! returned to the caller untouched.

use thiserror::Error;

use super::types::ResourceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// The source could not be opened or decoded.
    #[error("failed to load {track_id}: {reason}")]
    LoadFailed { track_id: String, reason: String },
    /// The output refused to start the transport.
    #[error("playback of {track_id} was blocked: {reason}")]
    PlaybackBlocked { track_id: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphAttachError {
    #[error("output {0} already has an analysis tap attached")]
    AlreadyAttached(ResourceId),
    #[error("no live output handle to attach to")]
    NoOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SweepError {
    #[error("audio resource {0} is busy and could not be inspected")]
    Busy(ResourceId),
    #[error("audio resource {0} is poisoned")]
    Poisoned(ResourceId),
}

/// Failures reported by an `AudioBackend` or one of its transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("failed to open audio output: {0}")]
    Open(String),
    #[error("output refused to start: {0}")]
    Refused(String),
    #[error("seek failed: {0}")]
    Seek(String),
}
