//! Analysis tap: a pass-through `Source` that mirrors a mono downmix of the
//! signal into a shared window for the spectrum analyzer.
//!
//! The audio thread only ever `try_lock`s the window; when the analyzer holds
//! it, samples accumulate locally and are flushed on the next attempt.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::{ChannelCount, SampleRate, Source};

use super::types::ResourceId;

/// Largest window the analyzer can ask for.
pub const TAP_WINDOW: usize = 32768;

/// Frames gathered before trying to publish.
const FLUSH_FRAMES: usize = 256;

struct TapWindow {
    samples: VecDeque<f32>,
}

/// Shared end of the tap, owned by an output handle.
pub struct TapBus {
    owner: ResourceId,
    window: Mutex<TapWindow>,
    suspended: AtomicBool,
    attached: AtomicBool,
    closed: AtomicBool,
}

impl TapBus {
    /// A new bus starts suspended, like a freshly created processing context.
    pub(crate) fn new(owner: ResourceId) -> Self {
        Self {
            owner,
            window: Mutex::new(TapWindow {
                samples: VecDeque::with_capacity(TAP_WINDOW),
            }),
            suspended: AtomicBool::new(true),
            attached: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn owner(&self) -> ResourceId {
        self.owner
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
    }

    /// The owning output was released; samples still draining from the
    /// device are no longer of interest.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the bus as observed. Returns false if it already was.
    pub(crate) fn claim_attachment(&self) -> bool {
        !self.attached.swap(true, Ordering::AcqRel)
    }

    /// Copy the most recent `out.len()` samples, zero-padding at the front
    /// when fewer are available.
    pub fn snapshot(&self, out: &mut [f32]) {
        out.fill(0.0);
        let Ok(window) = self.window.lock() else {
            return;
        };
        let n = out.len().min(window.samples.len());
        let skip = window.samples.len() - n;
        let offset = out.len() - n;
        for (dst, src) in out[offset..].iter_mut().zip(window.samples.iter().skip(skip)) {
            *dst = *src;
        }
    }

    /// Drop everything buffered; used when a new source replaces the old one.
    pub(crate) fn clear(&self) {
        if let Ok(mut window) = self.window.lock() {
            window.samples.clear();
        }
    }

    fn publish(&self, pending: &mut Vec<f32>) -> bool {
        if self.is_suspended() {
            pending.clear();
            return true;
        }
        let Ok(mut window) = self.window.try_lock() else {
            return false;
        };
        let overflow = (window.samples.len() + pending.len()).saturating_sub(TAP_WINDOW);
        let len = window.samples.len();
        window.samples.drain(..overflow.min(len));
        let keep_from = pending.len().saturating_sub(TAP_WINDOW);
        window.samples.extend(pending.drain(..).skip(keep_from));
        true
    }
}

/// Wraps a source and feeds its mono downmix into a `TapBus`.
pub struct TapSource<S> {
    inner: S,
    bus: Arc<TapBus>,
    pending: Vec<f32>,
    frame_sum: f32,
    frame_fill: u16,
}

impl<S: Source> TapSource<S> {
    pub(crate) fn new(inner: S, bus: Arc<TapBus>) -> Self {
        Self {
            inner,
            bus,
            pending: Vec::with_capacity(FLUSH_FRAMES * 2),
            frame_sum: 0.0,
            frame_fill: 0,
        }
    }

    fn flush(&mut self) {
        if !self.bus.publish(&mut self.pending) && self.pending.len() > TAP_WINDOW {
            let excess = self.pending.len() - TAP_WINDOW;
            self.pending.drain(..excess);
        }
    }
}

impl<S: Source> Iterator for TapSource<S> {
    type Item = rodio::Sample;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = match self.inner.next() {
            Some(s) => s,
            None => {
                self.flush();
                return None;
            }
        };

        let channels = u16::from(self.inner.channels()).max(1);
        self.frame_sum += sample;
        self.frame_fill += 1;
        if self.frame_fill >= channels {
            self.pending.push(self.frame_sum / channels as f32);
            self.frame_sum = 0.0;
            self.frame_fill = 0;
            if self.pending.len() >= FLUSH_FRAMES {
                self.flush();
            }
        }
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S: Source> Source for TapSource<S> {
    fn current_span_len(&self) -> Option<usize> {
        self.inner.current_span_len()
    }

    fn channels(&self) -> ChannelCount {
        self.inner.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.inner.sample_rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.pending.clear();
        self.frame_sum = 0.0;
        self.frame_fill = 0;
        self.inner.try_seek(pos)
    }
}
