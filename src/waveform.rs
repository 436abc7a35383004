//! Decorative waveform widgets.

mod decode;
mod peaks;
mod widget;

pub use decode::{WaveformData, WaveformHandle};
pub use peaks::{PeakAccumulator, PeakColumn, fit_columns};
pub use widget::WaveformWidget;
