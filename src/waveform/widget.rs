use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::audio::{ExclusivitySweeper, PlaybackState, ShadowHandle};
use crate::config::WaveformSettings;
use crate::timeline::{SeekTarget, TimelineSeekController};

use super::decode::{self, DecodeJob, WaveformData, WaveformHandle};
use super::peaks::PeakColumn;

type Callback = Box<dyn FnMut(f64)>;

/// A waveform for one file, drawn from a silent decode.
///
/// The widget never plays anything. It shows a progress overlay while its
/// file is the one the playback service has loaded, and turns clicks into
/// seeks on that service.
pub struct WaveformWidget {
    source_url: PathBuf,
    shadow: Arc<ShadowHandle>,
    data: WaveformHandle,
    cancel: Arc<AtomicBool>,
    on_ready: Option<Callback>,
    on_position_change: Option<Callback>,
    ready_sent: bool,
    last_position: Option<f64>,
    current: bool,
    timeline: TimelineSeekController,
}

impl WaveformWidget {
    /// Start decoding `source_url` in the background. The widget's audio
    /// handle comes from `sweeper`, so it is under supervision from the start.
    pub fn mount(
        source_url: impl Into<PathBuf>,
        sweeper: &ExclusivitySweeper,
        settings: &WaveformSettings,
    ) -> Self {
        let source_url = source_url.into();
        let shadow = Arc::new(sweeper.shadow_handle(source_url.display().to_string()));
        let data = WaveformHandle::new(Mutex::new(WaveformData::default()));
        let cancel = Arc::new(AtomicBool::new(false));

        let job = DecodeJob {
            path: source_url.clone(),
            columns: settings.peak_columns,
            chunk: settings.progressive_chunk,
            shadow: shadow.clone(),
            data: data.clone(),
            cancel: cancel.clone(),
        };
        if let Err(e) = decode::spawn(job) {
            warn!("could not start waveform decode: {e}");
            let mut d = data.lock().unwrap_or_else(|p| p.into_inner());
            d.complete = true;
            d.error = Some(e.to_string());
        }
        debug!("mounted waveform for {} on {}", source_url.display(), shadow.id());

        Self {
            source_url,
            shadow,
            data,
            cancel,
            on_ready: None,
            on_position_change: None,
            ready_sent: false,
            last_position: None,
            current: false,
            timeline: TimelineSeekController::new(),
        }
    }

    /// Called once with the duration in seconds when decoding finishes.
    pub fn on_ready(mut self, callback: impl FnMut(f64) + 'static) -> Self {
        self.on_ready = Some(Box::new(callback));
        self
    }

    /// Called with the playback position whenever it moves while this
    /// widget's file is playing.
    pub fn on_position_change(mut self, callback: impl FnMut(f64) + 'static) -> Self {
        self.on_position_change = Some(Box::new(callback));
        self
    }

    pub fn source_url(&self) -> &Path {
        &self.source_url
    }

    pub fn shadow(&self) -> &ShadowHandle {
        &self.shadow
    }

    fn data(&self) -> std::sync::MutexGuard<'_, WaveformData> {
        self.data.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of the columns decoded so far.
    pub fn columns(&self) -> Vec<PeakColumn> {
        self.data().columns.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.data().complete
    }

    pub fn error(&self) -> Option<String> {
        self.data().error.clone()
    }

    /// Follow the published playback state. Fires `on_ready` once decoding
    /// is done and `on_position_change` while this file is current.
    pub fn sync(&mut self, state: &PlaybackState) {
        let ready = {
            let d = self.data();
            (d.complete && d.error.is_none())
                .then(|| d.duration.unwrap_or(d.decoded).as_secs_f64())
        };
        if let Some(duration) = ready.filter(|_| !self.ready_sent) {
            self.ready_sent = true;
            if let Some(cb) = self.on_ready.as_mut() {
                cb(duration);
            }
        }

        self.current = state
            .current_track
            .as_ref()
            .is_some_and(|t| t.source_url == self.source_url);
        if !self.current {
            self.timeline.cancel();
            self.last_position = None;
            return;
        }

        self.timeline.sync(state);
        let position = state.position_seconds;
        if self.last_position != Some(position) {
            self.last_position = Some(position);
            if let Some(cb) = self.on_position_change.as_mut() {
                cb(position);
            }
        }
    }

    /// True while this widget's file is the one loaded for playback.
    #[cfg(test)]
    pub fn is_current(&self) -> bool {
        self.current
    }

    /// Progress overlay in `[0, 1]`, only while current.
    pub fn progress(&self) -> Option<f64> {
        self.current.then(|| self.timeline.fraction())
    }

    /// Seek the playback service to `fraction` of this waveform. Ignored
    /// unless this widget's file is current.
    pub fn click(&mut self, fraction: f64, target: &mut impl SeekTarget) -> bool {
        if !self.current {
            return false;
        }
        self.timeline.click(fraction, target);
        true
    }

    pub fn drag_to(&mut self, fraction: f64) {
        if self.current {
            self.timeline.drag_to(fraction);
        }
    }

    /// Per display frame: forward at most one pending drag seek.
    pub fn frame(&mut self, target: &mut impl SeekTarget) -> bool {
        self.timeline.frame(target)
    }

    pub fn release(&mut self, target: &mut impl SeekTarget) {
        self.timeline.release(target);
    }

    pub fn is_dragging(&self) -> bool {
        self.timeline.is_dragging()
    }
}

impl Drop for WaveformWidget {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}
