//! Playback and analysis core.
//!
//! One `PlaybackService` per session owns the only audible output. Every
//! other audio-capable resource is registered with the `ExclusivitySweeper`
//! and kept silent. `AudioGraphAnalyzer` observes the owned output through a
//! weak tap.

mod analyzer;
mod backend;
mod error;
mod loader;
mod output;
mod service;
mod sink;
mod sweeper;
mod tap;
mod types;

pub use analyzer::AudioGraphAnalyzer;
pub use backend::{AudioBackend, BoxedSource, PreparedSource, Transport};
pub use error::{AudioError, BackendError, GraphAttachError, SweepError};
pub use loader::{LoadOutcome, LoadRequest, SourceLoader, ThreadLoader, open_source};
pub use output::OutputHandle;
pub use service::PlaybackService;
pub use sweeper::{Audibility, AudioResource, ExclusivitySweeper, ShadowHandle, SweepReport};
pub use types::{Phase, PlaybackEvent, PlaybackHandle, PlaybackState, ResourceId};

#[cfg(test)]
mod tests;
