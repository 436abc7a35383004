//! Small shared types of the audio core: ids, published state and events.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::library::Track;

use super::error::AudioError;

/// Identity of one audio-capable resource registered with the sweeper.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The one mutable playback record of a session.
///
/// Only `PlaybackService` writes it. `position_seconds` stays within
/// `[0, duration_seconds]` and `is_playing` is false without a track.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    pub volume: f32,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

impl PlaybackState {
    pub fn empty(volume: f32) -> Self {
        Self {
            current_track: None,
            is_playing: false,
            volume,
            position_seconds: 0.0,
            duration_seconds: 0.0,
        }
    }

    pub fn is_current(&self, track_id: &str) -> bool {
        self.current_track.as_ref().is_some_and(|t| t.id == track_id)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::empty(1.0)
    }
}

/// Shared, read-only view of the playback state for other threads.
pub type PlaybackHandle = Arc<Mutex<PlaybackState>>;

/// Lifecycle of the owned output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No track selected.
    Empty,
    /// A new track was requested and its source is being prepared.
    Loading,
    /// A source is attached; `is_playing` tells paused from playing.
    Ready,
    /// The source ran out. The same track is being re-primed at position 0.
    Ended,
    /// The last load failed; the track stays selected but silent.
    Failed,
}

/// Notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    TrackChanged(Option<Track>),
    Playing(bool),
    /// Throttled while playing, immediate after a seek.
    Position(f64),
    /// Sent once per load, when the source is ready.
    Duration(f64),
    Volume(f32),
    Ended,
    Failed(AudioError),
}
