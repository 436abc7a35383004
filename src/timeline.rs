//! Pointer-to-time mapping for rendered timelines.
//!
//! A click seeks at once. A drag only moves the preview; the latest drag
//! position is sent at most once per display frame, and once more on release.

use log::trace;

use crate::audio::{PlaybackService, PlaybackState};

/// Where seeks go. Implemented by the playback service.
pub trait SeekTarget {
    fn seek_to(&mut self, seconds: f64);
}

impl SeekTarget for PlaybackService {
    fn seek_to(&mut self, seconds: f64) {
        PlaybackService::seek_to(self, seconds);
    }
}

#[derive(Debug, Default, Clone)]
pub struct TimelineSeekController {
    duration: f64,
    position: f64,
    dragging: bool,
    /// Latest drag position not yet sent.
    pending: Option<f64>,
}

impl TimelineSeekController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_duration(&mut self, seconds: f64) {
        self.duration = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.position = self.position.min(self.duration);
    }

    /// Mirror a published position. Ignored while the user is dragging so the
    /// handle does not jump back under the pointer.
    pub fn on_position(&mut self, seconds: f64) {
        if !self.dragging {
            self.position = seconds.clamp(0.0, self.duration);
        }
    }

    /// Follow a playback snapshot: duration and position.
    pub fn sync(&mut self, state: &PlaybackState) {
        self.set_duration(state.duration_seconds);
        self.on_position(state.position_seconds);
    }

    /// Position to draw: the drag preview while dragging.
    #[cfg(test)]
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn fraction(&self) -> f64 {
        if self.duration > 0.0 {
            self.position / self.duration
        } else {
            0.0
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    fn to_seconds(&self, fraction: f64) -> f64 {
        let f = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        f * self.duration
    }

    /// Seek straight to `fraction` of the timeline.
    pub fn click(&mut self, fraction: f64, target: &mut impl SeekTarget) {
        if self.duration <= 0.0 {
            return;
        }
        let seconds = self.to_seconds(fraction);
        self.position = seconds;
        self.dragging = false;
        self.pending = None;
        target.seek_to(seconds);
    }

    /// Move the drag preview. No seek is sent until the next `frame`.
    pub fn drag_to(&mut self, fraction: f64) {
        if self.duration <= 0.0 {
            return;
        }
        let seconds = self.to_seconds(fraction);
        self.dragging = true;
        self.position = seconds;
        self.pending = Some(seconds);
    }

    /// Once per display frame: send the latest drag position, if any.
    pub fn frame(&mut self, target: &mut impl SeekTarget) -> bool {
        match self.pending.take() {
            Some(seconds) if self.dragging => {
                trace!("drag seek to {seconds:.2}s");
                target.seek_to(seconds);
                true
            }
            _ => false,
        }
    }

    /// End the drag with a final seek at the last preview position.
    pub fn release(&mut self, target: &mut impl SeekTarget) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        self.pending = None;
        target.seek_to(self.position);
    }

    /// Abandon a drag without seeking.
    pub fn cancel(&mut self) {
        self.dragging = false;
        self.pending = None;
    }
}
