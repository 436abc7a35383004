//! Spectrum visualizer.

mod bars;
mod color;
mod renderer;
mod surface;

pub use bars::{IDLE_AMPLITUDE, idle_term, pointer_gain};
pub use color::{Palette, Rgb};
pub use renderer::VisualizationRenderer;
#[cfg(test)]
pub use surface::PixelSurface;
pub use surface::Surface;

#[cfg(test)]
mod tests;
