//! The session's playback owner.
//!
//! `PlaybackService` is the only holder of the audible `OutputHandle` and the
//! only writer of `PlaybackState`. Every operation drains finished loads
//! first, so state is always observed in request order.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PlaybackSettings;
use crate::library::Track;

use super::backend::AudioBackend;
use super::error::{AudioError, BackendError};
use super::loader::{LoadOutcome, LoadRequest, SourceLoader, ThreadLoader};
use super::output::OutputHandle;
use super::sink::RodioBackend;
use super::sweeper::{ExclusivitySweeper, SweepReport};
use super::types::{Phase, PlaybackEvent, PlaybackHandle, PlaybackState};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Intent {
    Play,
    Pause,
}

impl Intent {
    fn flipped(self) -> Self {
        match self {
            Self::Play => Self::Pause,
            Self::Pause => Self::Play,
        }
    }
}

/// The load the service is currently waiting for, plus what the user asked
/// for while it was in flight.
struct PendingLoad {
    ticket: u64,
    track: Track,
    intent: Intent,
    seek: Option<f64>,
}

pub struct PlaybackService {
    backend: Box<dyn AudioBackend>,
    loader: Box<dyn SourceLoader>,
    completions: Receiver<LoadOutcome>,
    completion_tx: Sender<LoadOutcome>,
    output: OutputHandle,
    sweeper: Arc<ExclusivitySweeper>,
    state: PlaybackState,
    shared: PlaybackHandle,
    phase: Phase,
    pending: Option<PendingLoad>,
    next_ticket: u64,
    /// False when neither the decoder nor the tags knew the length.
    duration_known: bool,
    subscribers: Vec<Sender<PlaybackEvent>>,
    position_interval: Duration,
    last_position_emit: Option<Instant>,
    last_error: Option<AudioError>,
}

impl PlaybackService {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        loader: Box<dyn SourceLoader>,
        sweeper: Arc<ExclusivitySweeper>,
        settings: &PlaybackSettings,
    ) -> Self {
        let volume = sanitize_volume(settings.initial_volume);
        let output = OutputHandle::new(&sweeper, volume);
        let state = PlaybackState::empty(volume);
        let (completion_tx, completions) = mpsc::channel();

        Self {
            backend,
            loader,
            completions,
            completion_tx,
            output,
            sweeper,
            shared: Arc::new(Mutex::new(state.clone())),
            state,
            phase: Phase::Empty,
            pending: None,
            next_ticket: 1,
            duration_known: false,
            subscribers: Vec::new(),
            position_interval: Duration::from_millis(settings.position_interval_ms),
            last_position_emit: None,
            last_error: None,
        }
    }

    /// Service on the default output device, decoding on worker threads.
    pub fn with_default_output(
        sweeper: Arc<ExclusivitySweeper>,
        settings: &PlaybackSettings,
    ) -> Result<Self, BackendError> {
        let backend = RodioBackend::open_default()?;
        Ok(Self::new(
            Box::new(backend),
            Box::new(ThreadLoader),
            sweeper,
            settings,
        ))
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Shared snapshot for readers on other threads, refreshed after every
    /// operation and tick.
    pub fn playback_handle(&self) -> PlaybackHandle {
        self.shared.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn output_handle(&self) -> &OutputHandle {
        &self.output
    }

    pub fn sweeper(&self) -> &Arc<ExclusivitySweeper> {
        &self.sweeper
    }

    /// The most recent recoverable failure, cleared by the next `play`.
    pub fn last_error(&self) -> Option<&AudioError> {
        self.last_error.as_ref()
    }

    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Play `track`. The current track toggles instead of restarting.
    pub fn play(&mut self, track: Track) {
        self.drain_completions();
        if self.state.is_current(&track.id) {
            self.toggle_play_pause();
            return;
        }

        info!("play {}", track.id);
        self.sweep();
        self.output.stop();

        let was_playing = self.state.is_playing;
        self.state.current_track = Some(track.clone());
        self.state.is_playing = false;
        self.state.position_seconds = 0.0;
        self.state.duration_seconds = 0.0;
        self.duration_known = false;
        self.last_error = None;
        self.phase = Phase::Loading;

        self.emit(PlaybackEvent::TrackChanged(Some(track.clone())));
        if was_playing {
            self.emit(PlaybackEvent::Playing(false));
        }
        self.emit(PlaybackEvent::Position(0.0));

        self.request_load(track, Intent::Play);
        self.publish();
    }

    /// Halt transport. Does nothing when nothing is playing.
    pub fn pause(&mut self) {
        self.drain_completions();
        if let Some(pending) = self.pending.as_mut() {
            pending.intent = Intent::Pause;
        }
        if !self.state.is_playing {
            self.sweep();
            return;
        }

        self.output.pause();
        self.state.is_playing = false;
        self.emit(PlaybackEvent::Playing(false));
        self.sweep();
        self.publish();
    }

    pub fn toggle_play_pause(&mut self) {
        self.drain_completions();
        let Some(track) = self.state.current_track.clone() else {
            return;
        };

        if let Some(pending) = self.pending.as_mut() {
            pending.intent = pending.intent.flipped();
            debug!("load {} will end {:?}", pending.ticket, pending.intent);
            return;
        }
        if self.state.is_playing {
            self.pause();
            return;
        }

        if self.phase == Phase::Failed || !self.output.has_source() {
            info!("retrying load of {}", track.id);
            self.last_error = None;
            self.phase = Phase::Loading;
            self.request_load(track, Intent::Play);
        } else {
            self.start_transport();
        }
        self.publish();
    }

    /// Set the session volume. Out-of-range values are clamped, NaN is 0.
    pub fn set_volume(&mut self, volume: f32) {
        self.drain_completions();
        let volume = sanitize_volume(volume);
        self.state.volume = volume;
        self.output.claim(volume);
        self.sweep();
        self.emit(PlaybackEvent::Volume(volume));
        self.publish();
    }

    /// Move the playhead to `seconds`, clamped to the current track.
    ///
    /// While a load is in flight the request is remembered and applied once
    /// the duration is known.
    pub fn seek_to(&mut self, seconds: f64) {
        self.drain_completions();
        if self.state.current_track.is_none() {
            return;
        }
        let seconds = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
        if let Some(pending) = self.pending.as_mut() {
            pending.seek = Some(seconds);
            return;
        }
        self.seek_output(seconds);
        self.publish();
    }

    /// Unload and clear the selection.
    pub fn stop(&mut self) {
        self.drain_completions();
        self.pending = None;
        self.output.stop();

        let had_track = self.state.current_track.is_some();
        let was_playing = self.state.is_playing;
        self.state = PlaybackState::empty(self.state.volume);
        self.phase = Phase::Empty;
        self.duration_known = false;

        if was_playing {
            self.emit(PlaybackEvent::Playing(false));
        }
        if had_track {
            self.emit(PlaybackEvent::TrackChanged(None));
        }
        self.sweep();
        self.publish();
    }

    /// Stop and release the output. The service stays inert afterwards.
    pub fn shutdown(&mut self) {
        self.stop();
        self.output.release();
        self.subscribers.clear();
        info!("playback service shut down");
    }

    /// Advance time: collect finished loads, follow the transport position and
    /// notice the end of the track.
    pub fn tick(&mut self, now: Instant) {
        self.drain_completions();
        if self.state.is_playing {
            if self.output.is_finished() {
                self.finish_track();
            } else {
                let position = self.output.position().as_secs_f64();
                if !self.duration_known && position > self.state.duration_seconds {
                    self.state.duration_seconds = position;
                }
                self.state.position_seconds = position.clamp(0.0, self.state.duration_seconds);

                let due = self
                    .last_position_emit
                    .is_none_or(|last| now.saturating_duration_since(last) >= self.position_interval);
                if due {
                    self.last_position_emit = Some(now);
                    self.emit(PlaybackEvent::Position(self.state.position_seconds));
                }
            }
        }
        self.publish();
    }

    fn request_load(&mut self, track: Track, intent: Intent) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        if let Some(old) = self.pending.replace(PendingLoad {
            ticket,
            track: track.clone(),
            intent,
            seek: None,
        }) {
            debug!("load {} superseded by {ticket}", old.ticket);
        }

        self.loader
            .load(LoadRequest { ticket, track }, self.completion_tx.clone());
        // Loaders are free to answer synchronously.
        self.drain_completions();
    }

    fn drain_completions(&mut self) {
        while let Ok(outcome) = self.completions.try_recv() {
            self.complete_load(outcome);
        }
    }

    fn complete_load(&mut self, outcome: LoadOutcome) {
        let Some(pending) = self.pending.take_if(|p| p.ticket == outcome.ticket) else {
            debug!("discarding stale load {}", outcome.ticket);
            return;
        };
        let track_id = pending.track.id.clone();

        let prepared = match outcome.result {
            Ok(prepared) => prepared,
            Err(reason) => {
                self.fail(AudioError::LoadFailed { track_id, reason }, Phase::Failed);
                return;
            }
        };

        let duration = prepared.duration.or(pending.track.duration);
        if let Err(e) = self.output.load(self.backend.as_mut(), prepared) {
            let reason = e.to_string();
            self.fail(AudioError::LoadFailed { track_id, reason }, Phase::Failed);
            return;
        }

        self.duration_known = duration.is_some();
        self.state.duration_seconds = duration.map(|d| d.as_secs_f64()).unwrap_or(0.0);
        self.state.position_seconds = 0.0;
        self.phase = Phase::Ready;
        debug!("loaded {track_id} ({:.1}s)", self.state.duration_seconds);
        self.emit(PlaybackEvent::Duration(self.state.duration_seconds));
        self.sweep();

        if let Some(seconds) = pending.seek {
            self.seek_output(seconds);
        }
        if pending.intent == Intent::Play {
            self.start_transport();
        }
    }

    /// Unmute the owned output at the session volume, silence everyone else,
    /// then start.
    fn start_transport(&mut self) {
        self.output.claim(self.state.volume);
        self.sweep();
        match self.output.play() {
            Ok(()) => {
                self.state.is_playing = true;
                self.last_position_emit = None;
                self.emit(PlaybackEvent::Playing(true));
            }
            Err(e) => {
                let track_id = self
                    .state
                    .current_track
                    .as_ref()
                    .map(|t| t.id.clone())
                    .unwrap_or_default();
                let reason = e.to_string();
                self.fail(AudioError::PlaybackBlocked { track_id, reason }, Phase::Ready);
            }
        }
    }

    fn seek_output(&mut self, seconds: f64) {
        let seconds = seconds.clamp(0.0, self.state.duration_seconds.max(0.0));
        if let Err(e) = self.output.seek(Duration::from_secs_f64(seconds)) {
            warn!("seek to {seconds:.1}s failed: {e}");
        }
        self.state.position_seconds = seconds;
        self.last_position_emit = Some(Instant::now());
        self.emit(PlaybackEvent::Position(seconds));
    }

    fn finish_track(&mut self) {
        let Some(track) = self.state.current_track.clone() else {
            return;
        };
        info!("{} ended", track.id);
        self.state.is_playing = false;
        self.state.position_seconds = 0.0;
        self.phase = Phase::Ended;
        self.emit(PlaybackEvent::Ended);
        self.emit(PlaybackEvent::Playing(false));
        self.emit(PlaybackEvent::Position(0.0));
        self.request_load(track, Intent::Pause);
    }

    fn fail(&mut self, error: AudioError, phase: Phase) {
        warn!("{error}");
        let was_playing = self.state.is_playing;
        self.state.is_playing = false;
        self.phase = phase;
        self.last_error = Some(error.clone());
        if was_playing {
            self.emit(PlaybackEvent::Playing(false));
        }
        self.emit(PlaybackEvent::Failed(error));
    }

    fn sweep(&self) -> SweepReport {
        let report = self.sweeper.sweep(Some(self.output.id()));
        if report.leaks > 0 {
            debug!(
                "sweep silenced {} leaking resource(s), {} audible now",
                report.leaks,
                self.sweeper.audible_count()
            );
        }
        if !report.is_complete() {
            debug!("{} resource(s) skipped this sweep", report.unreachable.len());
        }
        report
    }

    fn emit(&mut self, event: PlaybackEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn publish(&self) {
        let mut shared = self.shared.lock().unwrap_or_else(|p| p.into_inner());
        *shared = self.state.clone();
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        self.output.release();
    }
}

fn sanitize_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
