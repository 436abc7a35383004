use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use log::{debug, info};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::app::App;
use crate::audio::{AudioGraphAnalyzer, PlaybackService};
use crate::config;
use crate::mpris::{ControlCmd, MprisHandle, track_object_path};
use crate::runtime::mpris_sync::update_mpris;
use crate::runtime::startup::Core;
use crate::ui::{self, UiAreas};
use crate::visual::VisualizationRenderer;

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Internal two-key prefix state used for `gg` handling.
    pub pending_gg: bool,
    /// A left-button drag started on the waveform strip.
    pub scrubbing: bool,
    /// Regions from the last draw, for mouse hit-testing.
    pub areas: UiAreas,
}

/// Lets drag seeks through at most once per display frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameGate {
    interval: Duration,
    last: Instant,
}

impl FrameGate {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    /// True when a full interval has passed since the last time it was.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) < self.interval {
            return false;
        }
        self.last = now;
        true
    }
}

/// Main terminal event loop: handles input, UI drawing, the playback clock
/// and MPRIS. Returns `Ok(())` when shutdown is requested.
#[allow(clippy::too_many_arguments)]
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    core: &mut Core,
    mpris: &MprisHandle,
    control_tx: &mpsc::Sender<ControlCmd>,
    control_rx: &mpsc::Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    let Core {
        service,
        analyzer,
        renderer,
        events,
    } = core;
    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(settings.ui.frame_rate.max(1)));
    let idle_interval = Duration::from_millis(settings.ui.idle_poll_ms.max(1));
    let mut seek_gate = FrameGate::new(frame_interval, Instant::now());

    loop {
        let now = Instant::now();
        service.tick(now);
        for event in events.try_iter() {
            app.note_event(&event);
        }
        app.apply_playback(service.state().clone(), service.phase());
        app.sync_waveform(service.sweeper(), &settings.waveform);
        if let Some(widget) = app.waveform.as_mut() {
            if widget.is_dragging() && seek_gate.due(now) {
                widget.frame(service);
            }
        }
        renderer.sync(app.playback.is_playing);
        update_mpris(mpris, app);

        let display = app.display_indices();
        let bins = analyzer.read();
        let mut areas = state.areas;
        terminal.draw(|f| {
            areas = ui::draw(
                f,
                app,
                &display,
                renderer,
                bins,
                now,
                &settings.ui,
                &settings.controls,
            );
        })?;
        state.areas = areas;

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app, service, mpris) {
                shutdown(service, analyzer, renderer);
                return Ok(());
            }
        }

        let timeout = if renderer.is_running() {
            frame_interval
        } else {
            idle_interval
        };
        if !event::poll(timeout)? {
            continue;
        }
        // Take everything already queued so a burst of drag events costs one
        // pass and at most one seek.
        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key_event(key, settings, app, service, renderer, mpris, control_tx, state)
                    {
                        shutdown(service, analyzer, renderer);
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => {
                    if let Some(pointer) = handle_mouse_event(mouse, app, service, mpris, state) {
                        renderer.set_pointer(pointer);
                    }
                }
                _ => {}
            }
            if !event::poll(Duration::ZERO)? {
                break;
            }
        }
    }
}

fn shutdown(
    service: &mut PlaybackService,
    analyzer: &mut AudioGraphAnalyzer,
    renderer: &VisualizationRenderer,
) {
    analyzer.detach();
    if let Some(err) = service.last_error() {
        info!("last playback error: {err}");
    }
    service.shutdown();
    info!("visualizer drew {} frames", renderer.frames_drawn());
}

/// Play the track at library `index`, with the cursor following it.
fn play_index(app: &mut App, service: &mut PlaybackService, index: usize) {
    let Some(track) = app.tracks.get(index).cloned() else {
        return;
    };
    if !app.filter_mode {
        app.follow_playback_on();
    }
    app.set_selected(index);
    service.play(track);
}

fn seek_and_announce(service: &mut PlaybackService, mpris: &MprisHandle, seconds: f64) {
    service.seek_to(seconds);
    mpris.seeked(service.state().position_seconds);
}

fn handle_control_cmd(
    cmd: ControlCmd,
    app: &mut App,
    service: &mut PlaybackService,
    mpris: &MprisHandle,
) -> bool {
    debug!("control: {cmd:?}");
    let loaded = service.state().current_track.is_some();
    let playing = service.state().is_playing;
    match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => {
            if loaded {
                if !playing {
                    service.toggle_play_pause();
                }
            } else if app.has_tracks() {
                let selected = app.selected;
                play_index(app, service, selected);
            }
        }
        ControlCmd::Pause => {
            if playing {
                service.pause();
            }
        }
        ControlCmd::PlayPause => {
            if loaded {
                service.toggle_play_pause();
            } else if app.has_tracks() {
                let selected = app.selected;
                play_index(app, service, selected);
            }
        }
        ControlCmd::Stop => service.stop(),
        ControlCmd::Next => {
            let from = app.current_index().unwrap_or(app.selected);
            if let Some(next) = app.next_in_view_from(from) {
                play_index(app, service, next);
            }
        }
        ControlCmd::Prev => {
            let from = app.current_index().unwrap_or(app.selected);
            if let Some(prev) = app.prev_in_view_from(from) {
                play_index(app, service, prev);
            }
        }
        ControlCmd::Seek(offset) => {
            if loaded {
                let target = service.state().position_seconds + offset as f64 / 1_000_000.0;
                seek_and_announce(service, mpris, target);
            }
        }
        ControlCmd::SetPosition(track_id, position) => {
            // Stale requests name a track that is no longer loaded.
            let current = app.current_index().map(track_object_path);
            if current.as_deref() == Some(track_id.as_str()) {
                seek_and_announce(service, mpris, position as f64 / 1_000_000.0);
            }
        }
        ControlCmd::Volume(volume) => service.set_volume(volume as f32),
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    service: &mut PlaybackService,
    renderer: &mut VisualizationRenderer,
    mpris: &MprisHandle,
    control_tx: &mpsc::Sender<ControlCmd>,
    state: &mut EventLoopState,
) -> bool {
    if app.filter_mode {
        state.pending_gg = false;
        match key.code {
            KeyCode::Esc => app.clear_filter(),
            KeyCode::Backspace => app.pop_filter_char(),
            KeyCode::Char('j') | KeyCode::Char('n')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                app.next();
            }
            KeyCode::Char('k') | KeyCode::Char('p')
                if key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                app.prev();
            }
            KeyCode::Char(c) => {
                if !c.is_control() {
                    app.push_filter_char(c);
                }
            }
            KeyCode::Enter => {
                if !app.display_indices().is_empty() {
                    app.exit_filter_mode();
                    let selected = app.selected;
                    play_index(app, service, selected);
                }
            }
            _ => {}
        }
        return false;
    }

    let scrub = settings.controls.scrub_seconds as f64;
    let step = settings.controls.volume_step;
    if key.code != KeyCode::Char('g') {
        state.pending_gg = false;
    }
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => app.enter_filter_mode(),
        KeyCode::Char('g') => {
            if state.pending_gg {
                state.pending_gg = false;
                app.follow_playback_off();
                if let Some(&first) = app.display_indices().first() {
                    app.set_selected(first);
                }
            } else {
                state.pending_gg = true;
            }
        }
        KeyCode::Char('G') => {
            app.follow_playback_off();
            if let Some(&last) = app.display_indices().last() {
                app.set_selected(last);
            }
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_playback_off();
            app.next();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_playback_off();
            app.prev();
        }
        KeyCode::Enter => {
            if app.has_tracks() && !app.is_selected_playing() {
                let selected = app.selected;
                play_index(app, service, selected);
            }
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            let _ = control_tx.send(ControlCmd::PlayPause);
        }
        KeyCode::Char('l') => {
            let _ = control_tx.send(ControlCmd::Next);
        }
        KeyCode::Char('h') => {
            let _ = control_tx.send(ControlCmd::Prev);
        }
        KeyCode::Char('L') => {
            let target = service.state().position_seconds + scrub;
            seek_and_announce(service, mpris, target);
        }
        KeyCode::Char('H') => {
            let target = service.state().position_seconds - scrub;
            seek_and_announce(service, mpris, target);
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            service.set_volume(service.state().volume + step);
        }
        KeyCode::Char('-') => {
            service.set_volume(service.state().volume - step);
        }
        KeyCode::Char('K') => app.toggle_metadata_window(),
        KeyCode::Char('v') => {
            let scheme = renderer.cycle_color_scheme();
            debug!("color scheme: {scheme:?}");
        }
        KeyCode::Char('m') => {
            let layout = renderer.toggle_layout();
            debug!("bar layout: {layout:?}");
        }
        _ => {}
    }
    false
}

/// Route mouse input: the waveform strip seeks, the visualizer follows the
/// pointer. Returns a new visualizer pointer when it changed.
fn handle_mouse_event(
    mouse: MouseEvent,
    app: &mut App,
    service: &mut PlaybackService,
    mpris: &MprisHandle,
    state: &mut EventLoopState,
) -> Option<Option<f32>> {
    let (column, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let fraction = state.areas.waveform_fraction(column, row)?;
            let widget = app.waveform.as_mut()?;
            state.scrubbing = widget.click(fraction, service);
            None
        }
        MouseEventKind::Drag(MouseButton::Left) if state.scrubbing => {
            let fraction = state.areas.waveform_drag_fraction(column)?;
            if let Some(widget) = app.waveform.as_mut() {
                widget.drag_to(fraction);
            }
            None
        }
        MouseEventKind::Up(MouseButton::Left) if state.scrubbing => {
            state.scrubbing = false;
            if let Some(widget) = app.waveform.as_mut() {
                widget.release(service);
                info!("scrubbed to {:.1}s", service.state().position_seconds);
            }
            mpris.seeked(service.state().position_seconds);
            None
        }
        MouseEventKind::Moved => Some(state.areas.visualizer_fraction(column, row)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{SeekTarget, TimelineSeekController};

    #[derive(Default)]
    struct Recorder(Vec<f64>);

    impl SeekTarget for Recorder {
        fn seek_to(&mut self, seconds: f64) {
            self.0.push(seconds);
        }
    }

    #[test]
    fn gate_opens_once_per_interval() {
        let start = Instant::now();
        let mut gate = FrameGate::new(Duration::from_millis(16), start);
        assert!(!gate.due(start));
        assert!(!gate.due(start + Duration::from_millis(15)));
        assert!(gate.due(start + Duration::from_millis(16)));
        assert!(!gate.due(start + Duration::from_millis(20)));
        assert!(gate.due(start + Duration::from_millis(40)));
    }

    #[test]
    fn drags_within_one_frame_send_a_single_seek() {
        let interval = Duration::from_millis(16);
        let start = Instant::now();
        let mut gate = FrameGate::new(interval, start);
        let mut timeline = TimelineSeekController::new();
        timeline.set_duration(100.0);
        let mut target = Recorder::default();

        for (ms, fraction) in [(4, 0.125), (8, 0.25), (12, 0.5)] {
            timeline.drag_to(fraction);
            if gate.due(start + Duration::from_millis(ms)) {
                timeline.frame(&mut target);
            }
        }
        assert!(target.0.is_empty());

        if gate.due(start + interval) {
            timeline.frame(&mut target);
        }
        assert_eq!(target.0, vec![50.0]);

        timeline.release(&mut target);
        assert_eq!(target.0, vec![50.0, 50.0]);
    }
}
