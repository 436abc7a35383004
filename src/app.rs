//! Application module: the model the TUI draws and the runtime mutates.
//!
//! `App` holds the library, the cursor and a mirror of the published
//! playback state. Playback itself stays in `audio::PlaybackService`.

mod model;

pub use model::*;
