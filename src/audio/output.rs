//! The session's single audible output.
//!
//! `OutputHandle` is deliberately not `Clone`: whoever holds it is the one
//! party allowed to unmute, change gain or start transport. The sweeper only
//! sees it through the `AudioResource` registration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError, Weak};
use std::time::Duration;

use log::debug;

use super::backend::{AudioBackend, PreparedSource, Transport};
use super::error::{BackendError, SweepError};
use super::sweeper::{Audibility, AudioResource, ExclusivitySweeper};
use super::tap::{TapBus, TapSource};
use super::types::ResourceId;

struct OutputInner {
    transport: Option<Box<dyn Transport>>,
    muted: bool,
    volume: f32,
    playing: bool,
    /// Set by a sweep when another owner took over; cleared by `claim`.
    intercepted: bool,
}

impl OutputInner {
    fn apply_gain(&mut self) {
        let gain = if self.muted { 0.0 } else { self.volume };
        if let Some(t) = self.transport.as_mut() {
            t.set_volume(gain);
        }
    }
}

struct OutputCore {
    id: ResourceId,
    inner: Mutex<OutputInner>,
    tap: Arc<TapBus>,
    released: AtomicBool,
}

impl OutputCore {
    fn inner(&self) -> MutexGuard<'_, OutputInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl AudioResource for OutputCore {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn label(&self) -> String {
        format!("output{}", self.id)
    }

    fn audibility(&self) -> Result<Audibility, SweepError> {
        let inner = match self.inner.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return Err(SweepError::Busy(self.id)),
            Err(TryLockError::Poisoned(_)) => return Err(SweepError::Poisoned(self.id)),
        };
        Ok(Audibility {
            muted: inner.muted,
            volume: inner.volume,
            playing: inner.playing,
        })
    }

    fn silence(&self) -> Result<(), SweepError> {
        let mut inner = match self.inner.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return Err(SweepError::Busy(self.id)),
            Err(TryLockError::Poisoned(_)) => return Err(SweepError::Poisoned(self.id)),
        };
        if let Some(t) = inner.transport.as_mut() {
            t.pause();
            // Rewinding is best effort; a source that cannot seek stays paused.
            let _ = t.seek(Duration::ZERO);
        }
        inner.playing = false;
        inner.muted = true;
        inner.volume = 0.0;
        inner.intercepted = true;
        inner.apply_gain();
        Ok(())
    }
}

pub struct OutputHandle {
    core: Arc<OutputCore>,
}

impl OutputHandle {
    /// Create an output and register it with `sweeper`.
    pub fn new(sweeper: &ExclusivitySweeper, volume: f32) -> Self {
        let id = sweeper.allocate_id();
        let core = Arc::new(OutputCore {
            id,
            inner: Mutex::new(OutputInner {
                transport: None,
                muted: false,
                volume: volume.clamp(0.0, 1.0),
                playing: false,
                intercepted: false,
            }),
            tap: Arc::new(TapBus::new(id)),
            released: AtomicBool::new(false),
        });
        sweeper.register(&core);
        Self { core }
    }

    pub fn id(&self) -> ResourceId {
        self.core.id
    }

    pub fn is_released(&self) -> bool {
        self.core.released.load(Ordering::Acquire)
    }

    /// Weak view of the analysis tap; never keeps the output alive.
    pub(crate) fn tap(&self) -> Weak<TapBus> {
        Arc::downgrade(&self.core.tap)
    }

    #[cfg(test)]
    pub(crate) fn tap_source<S: rodio::Source>(&self, source: S) -> TapSource<S> {
        TapSource::new(source, self.core.tap.clone())
    }

    /// Replace the current source with `prepared`, routed through the tap.
    /// The new transport starts paused at the current gain.
    pub fn load(
        &self,
        backend: &mut dyn AudioBackend,
        prepared: PreparedSource,
    ) -> Result<(), BackendError> {
        self.stop();
        self.core.tap.clear();
        let tapped = TapSource::new(prepared.source, self.core.tap.clone());
        let transport = backend.open(Box::new(tapped))?;

        let mut inner = self.core.inner();
        inner.transport = Some(transport);
        inner.playing = false;
        inner.apply_gain();
        Ok(())
    }

    pub fn has_source(&self) -> bool {
        self.core.inner().transport.is_some()
    }

    /// Take the output back after a sweep silenced it: unmute, restore gain,
    /// drop the interception.
    pub fn claim(&self, volume: f32) {
        let mut inner = self.core.inner();
        if inner.intercepted {
            debug!("output {} reclaimed", self.core.id);
        }
        inner.intercepted = false;
        inner.muted = false;
        inner.volume = volume.clamp(0.0, 1.0);
        inner.apply_gain();
    }

    pub fn play(&self) -> Result<(), BackendError> {
        let mut inner = self.core.inner();
        if inner.intercepted {
            // Someone else owns the session now; starting would be a no-op.
            return Ok(());
        }
        let Some(t) = inner.transport.as_mut() else {
            return Err(BackendError::Refused("no source loaded".into()));
        };
        t.play()?;
        inner.playing = true;
        Ok(())
    }

    pub fn pause(&self) {
        let mut inner = self.core.inner();
        if let Some(t) = inner.transport.as_mut() {
            t.pause();
        }
        inner.playing = false;
    }

    /// Halt and drop the current source.
    pub fn stop(&self) {
        let mut inner = self.core.inner();
        if let Some(mut t) = inner.transport.take() {
            t.stop();
        }
        inner.playing = false;
    }

    pub fn seek(&self, position: Duration) -> Result<(), BackendError> {
        let mut inner = self.core.inner();
        match inner.transport.as_mut() {
            Some(t) => t.seek(position),
            None => Err(BackendError::Seek("no source loaded".into())),
        }
    }

    pub fn position(&self) -> Duration {
        self.core
            .inner()
            .transport
            .as_ref()
            .map(|t| t.position())
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_finished(&self) -> bool {
        self.core
            .inner()
            .transport
            .as_ref()
            .is_some_and(|t| t.is_finished())
    }

    #[cfg(test)]
    pub fn audibility(&self) -> Audibility {
        let inner = self.core.inner();
        Audibility {
            muted: inner.muted,
            volume: inner.volume,
            playing: inner.playing,
        }
    }

    /// Stop, mute and mark the handle unusable for new analysis taps.
    pub fn release(&self) {
        self.stop();
        {
            let mut inner = self.core.inner();
            inner.muted = true;
            inner.apply_gain();
        }
        self.core.tap.close();
        self.core.released.store(true, Ordering::Release);
    }
}

impl Drop for OutputHandle {
    fn drop(&mut self) {
        self.release();
    }
}
