//! The seam between the playback core and the host's audio facility.
//!
//! `rodio` is the production implementation (see `sink`); tests drive the
//! service through in-memory fakes of the same traits.

use std::time::Duration;

use rodio::Source;

use super::error::BackendError;

/// A decoded source ready to be attached to an output.
pub type BoxedSource = Box<dyn Source + Send>;

/// Decoder output plus what we learned about it while opening.
pub struct PreparedSource {
    pub source: BoxedSource,
    pub duration: Option<Duration>,
}

impl PreparedSource {
    pub fn new(source: BoxedSource, duration: Option<Duration>) -> Self {
        Self { source, duration }
    }
}

/// Transport controls of one attached source.
///
/// A transport starts paused. Volume here is the effective gain; muting is
/// expressed by the caller as gain 0.
pub trait Transport: Send {
    fn play(&mut self) -> Result<(), BackendError>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn seek(&mut self, position: Duration) -> Result<(), BackendError>;
    fn position(&self) -> Duration;
    /// True once the attached source has been fully consumed.
    fn is_finished(&self) -> bool;
}

/// Opens transports on the session's output device.
pub trait AudioBackend {
    fn open(&mut self, source: BoxedSource) -> Result<Box<dyn Transport>, BackendError>;
}
