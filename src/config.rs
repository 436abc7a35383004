//! Settings schema and loading.
//!
//! Every tunable of the audio core (analyzer resolution, visualizer presets,
//! position cadence) lives here so the core types take plain values and stay
//! free of file/env concerns.

mod load;
mod schema;

pub use load::resolve_config_path;
pub use schema::*;
