//! Track descriptors and the directory scanner that produces them.
//!
//! The scanner is a caller of the audio core: it only builds `Track` values,
//! it never touches playback.

mod display;
mod model;
mod scan;

pub use display::display_from_fields;
pub use model::{Track, TrackMeta};
pub use scan::scan;
