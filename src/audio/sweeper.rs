//! Session-wide registry of audio-capable resources and the sweep that keeps
//! all of them but one silent.
//!
//! Resources join the registry explicitly: the owned output registers itself
//! when it is built, decorative widgets receive their handle from
//! [`ExclusivitySweeper::shadow_handle`], and anything else can call
//! [`ExclusivitySweeper::register`]. Registrations are weak, so dropping a
//! resource is enough to leave the registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError, Weak};
use std::time::Duration;

use log::{debug, trace, warn};

use super::error::SweepError;
use super::types::ResourceId;

/// The audible properties of a resource at one observation point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Audibility {
    pub muted: bool,
    pub volume: f32,
    pub playing: bool,
}

impl Audibility {
    #[cfg(test)]
    pub const SILENT: Audibility = Audibility {
        muted: true,
        volume: 0.0,
        playing: false,
    };

    pub fn is_audible(&self) -> bool {
        !self.muted && self.volume > 0.0
    }
}

/// Anything in the session that could make sound.
pub trait AudioResource: Send + Sync {
    fn resource_id(&self) -> ResourceId;

    /// Short name used in logs.
    fn label(&self) -> String;

    fn audibility(&self) -> Result<Audibility, SweepError>;

    /// Halt transport, rewind, force mute and zero volume, and turn future
    /// start requests into silent no-ops.
    fn silence(&self) -> Result<(), SweepError>;
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Resources that were visited and silenced.
    pub silenced: usize,
    /// Of those, how many were audible before the sweep.
    pub leaks: usize,
    /// Resources that could not be inspected this time.
    pub unreachable: Vec<ResourceId>,
}

impl SweepReport {
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }
}

struct Entry {
    id: ResourceId,
    resource: Weak<dyn AudioResource>,
}

pub struct ExclusivitySweeper {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl ExclusivitySweeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn allocate_id(&self) -> ResourceId {
        ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Put `resource` under supervision until it is dropped.
    pub fn register<R: AudioResource + 'static>(&self, resource: &Arc<R>) {
        let as_dyn: Arc<dyn AudioResource> = resource.clone();
        let entry = Entry {
            id: as_dyn.resource_id(),
            resource: Arc::downgrade(&as_dyn),
        };
        debug!("registered audio resource {} ({})", entry.id, as_dyn.label());
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.retain(|e| e.resource.strong_count() > 0 && e.id != entry.id);
        entries.push(entry);
    }

    /// Build a capability-limited handle for visualization-only decoding.
    pub fn shadow_handle(&self, label: impl Into<String>) -> ShadowHandle {
        let voice = Arc::new(ShadowVoice {
            id: self.allocate_id(),
            label: label.into(),
            state: Mutex::new(ShadowState::default()),
        });
        self.register(&voice);
        ShadowHandle { voice }
    }

    /// Number of live registrations.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self) -> Vec<(ResourceId, Arc<dyn AudioResource>)> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.retain(|e| e.resource.strong_count() > 0);
        entries
            .iter()
            .filter_map(|e| e.resource.upgrade().map(|r| (e.id, r)))
            .collect()
    }

    /// Silence every live resource except `owned`.
    ///
    /// Never fails: resources that cannot be reached are logged and listed in
    /// the report, and the sweep carries on with the rest.
    pub fn sweep(&self, owned: Option<ResourceId>) -> SweepReport {
        let mut report = SweepReport::default();

        for (id, resource) in self.live() {
            if Some(id) == owned {
                continue;
            }
            let was_audible = matches!(resource.audibility(), Ok(a) if a.is_audible());
            match resource.silence() {
                Ok(()) => {
                    report.silenced += 1;
                    if was_audible {
                        report.leaks += 1;
                        warn!("silenced leaking audio resource {id} ({})", resource.label());
                    }
                }
                Err(e) => {
                    warn!("sweep could not reach {}: {e}", resource.label());
                    report.unreachable.push(id);
                }
            }
        }

        trace!(
            "sweep done: silenced={} leaks={} unreachable={}",
            report.silenced,
            report.leaks,
            report.unreachable.len()
        );
        report
    }

    /// How many resources are audible right now. Unreachable ones are not counted.
    pub fn audible_count(&self) -> usize {
        self.live()
            .iter()
            .filter(|(_, r)| matches!(r.audibility(), Ok(a) if a.is_audible()))
            .count()
    }
}

#[derive(Debug)]
struct ShadowState {
    muted: bool,
    volume: f32,
    playing: bool,
    position: Duration,
    start_requests: u32,
}

impl Default for ShadowState {
    fn default() -> Self {
        Self {
            muted: true,
            volume: 0.0,
            playing: false,
            position: Duration::ZERO,
            start_requests: 0,
        }
    }
}

struct ShadowVoice {
    id: ResourceId,
    label: String,
    state: Mutex<ShadowState>,
}

impl ShadowVoice {
    fn try_state(&self) -> Result<std::sync::MutexGuard<'_, ShadowState>, SweepError> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(SweepError::Busy(self.id)),
            Err(TryLockError::Poisoned(_)) => Err(SweepError::Poisoned(self.id)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ShadowState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl AudioResource for ShadowVoice {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn label(&self) -> String {
        format!("shadow:{}", self.label)
    }

    fn audibility(&self) -> Result<Audibility, SweepError> {
        let s = self.try_state()?;
        Ok(Audibility {
            muted: s.muted,
            volume: s.volume,
            playing: s.playing,
        })
    }

    fn silence(&self) -> Result<(), SweepError> {
        let mut s = self.try_state()?;
        s.playing = false;
        s.position = Duration::ZERO;
        s.muted = true;
        s.volume = 0.0;
        Ok(())
    }
}

/// Audio handle handed to decorative widgets.
///
/// It can be asked to start, pause and report its transport, which keeps a
/// widget's own state machine working, but it has no way to unmute or raise
/// its volume. Start requests are intercepted: they flip the reported
/// transport state and never reach an output.
pub struct ShadowHandle {
    voice: Arc<ShadowVoice>,
}

impl ShadowHandle {
    pub fn id(&self) -> ResourceId {
        self.voice.id
    }

    /// Ask the shadow transport to start. Always reports success.
    pub fn request_start(&self) -> bool {
        let mut s = self.voice.state();
        s.start_requests += 1;
        trace!("intercepted start on {}", self.voice.label());
        s.playing = true;
        s.muted = true;
        s.volume = 0.0;
        true
    }

    pub fn request_pause(&self) {
        self.voice.state().playing = false;
    }

    /// Advance the shadow transport's own clock (decode progress, not sound).
    pub fn advance_to(&self, position: Duration) {
        self.voice.state().position = position;
    }

    #[cfg(test)]
    pub fn is_started(&self) -> bool {
        self.voice.state().playing
    }

    pub fn position(&self) -> Duration {
        self.voice.state().position
    }

    #[cfg(test)]
    pub fn start_requests(&self) -> u32 {
        self.voice.state().start_requests
    }

    #[cfg(test)]
    pub fn audibility(&self) -> Audibility {
        let s = self.voice.state();
        Audibility {
            muted: s.muted,
            volume: s.volume,
            playing: s.playing,
        }
    }

    #[cfg(test)]
    pub(crate) fn hold_lock_for_test(&self) -> std::sync::MutexGuard<'_, impl std::fmt::Debug> {
        self.voice.state()
    }
}
