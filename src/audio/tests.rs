use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rodio::source::SineWave;

use crate::config::{AnalyzerSettings, PlaybackSettings};
use crate::library::Track;

use super::*;

#[derive(Debug, Default)]
struct FakeSinkState {
    opened: usize,
    playing: bool,
    volume: f32,
    position: Duration,
    finished: bool,
    refuse_play: bool,
    fail_open: bool,
}

type SharedSink = Arc<Mutex<FakeSinkState>>;

struct FakeBackend {
    sink: SharedSink,
}

impl AudioBackend for FakeBackend {
    fn open(&mut self, _source: BoxedSource) -> Result<Box<dyn Transport>, BackendError> {
        let mut s = self.sink.lock().unwrap();
        if s.fail_open {
            return Err(BackendError::Open("device gone".into()));
        }
        s.opened += 1;
        s.playing = false;
        s.position = Duration::ZERO;
        s.finished = false;
        Ok(Box::new(FakeTransport {
            sink: self.sink.clone(),
        }))
    }
}

struct FakeTransport {
    sink: SharedSink,
}

impl Transport for FakeTransport {
    fn play(&mut self) -> Result<(), BackendError> {
        let mut s = self.sink.lock().unwrap();
        if s.refuse_play {
            return Err(BackendError::Refused("no user gesture".into()));
        }
        s.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.lock().unwrap().playing = false;
    }

    fn stop(&mut self) {
        self.sink.lock().unwrap().playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.lock().unwrap().volume = volume;
    }

    fn seek(&mut self, position: Duration) -> Result<(), BackendError> {
        self.sink.lock().unwrap().position = position;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.sink.lock().unwrap().position
    }

    fn is_finished(&self) -> bool {
        self.sink.lock().unwrap().finished
    }
}

fn sine() -> BoxedSource {
    Box::new(SineWave::new(440.0))
}

/// Answers every request before `load` returns.
#[derive(Default)]
struct InstantLoader {
    durations: HashMap<String, Duration>,
    broken: HashSet<String>,
}

impl InstantLoader {
    fn with(mut self, id: &str, seconds: f64) -> Self {
        self.durations
            .insert(id.to_string(), Duration::from_secs_f64(seconds));
        self
    }

    fn broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }
}

impl SourceLoader for InstantLoader {
    fn load(&self, request: LoadRequest, reply: Sender<LoadOutcome>) {
        let result = if self.broken.contains(&request.track.id) {
            Err("unsupported format".to_string())
        } else {
            let duration = self.durations.get(&request.track.id).copied();
            Ok(PreparedSource::new(sine(), duration))
        };
        reply
            .send(LoadOutcome {
                ticket: request.ticket,
                result,
            })
            .unwrap();
    }
}

/// Holds requests until the test answers them.
#[derive(Clone, Default)]
struct ManualLoader {
    requests: Arc<Mutex<Vec<(LoadRequest, Sender<LoadOutcome>)>>>,
}

impl ManualLoader {
    fn tickets(&self) -> Vec<(u64, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| (r.ticket, r.track.id.clone()))
            .collect()
    }

    fn complete(&self, ticket: u64, seconds: f64) {
        let requests = self.requests.lock().unwrap();
        let (_, reply) = requests
            .iter()
            .find(|(r, _)| r.ticket == ticket)
            .expect("known ticket");
        reply
            .send(LoadOutcome {
                ticket,
                result: Ok(PreparedSource::new(
                    sine(),
                    Some(Duration::from_secs_f64(seconds)),
                )),
            })
            .unwrap();
    }
}

impl SourceLoader for ManualLoader {
    fn load(&self, request: LoadRequest, reply: Sender<LoadOutcome>) {
        self.requests.lock().unwrap().push((request, reply));
    }
}

/// A foreign resource that ignores the rules and unmutes itself.
struct RogueVoice {
    id: ResourceId,
    state: Mutex<Audibility>,
}

impl RogueVoice {
    fn new(sweeper: &Arc<ExclusivitySweeper>) -> Arc<Self> {
        let voice = Arc::new(Self {
            id: sweeper.allocate_id(),
            state: Mutex::new(Audibility::SILENT),
        });
        sweeper.register(&voice);
        voice
    }

    fn misbehave(&self) {
        *self.state.lock().unwrap() = Audibility {
            muted: false,
            volume: 1.0,
            playing: true,
        };
    }
}

impl AudioResource for RogueVoice {
    fn resource_id(&self) -> ResourceId {
        self.id
    }

    fn label(&self) -> String {
        "rogue".into()
    }

    fn audibility(&self) -> Result<Audibility, SweepError> {
        Ok(*self.state.lock().unwrap())
    }

    fn silence(&self) -> Result<(), SweepError> {
        *self.state.lock().unwrap() = Audibility::SILENT;
        Ok(())
    }
}

struct Harness {
    service: PlaybackService,
    sink: SharedSink,
    sweeper: Arc<ExclusivitySweeper>,
}

fn harness(loader: impl SourceLoader + 'static) -> Harness {
    let sink = SharedSink::default();
    let sweeper = ExclusivitySweeper::new();
    let service = PlaybackService::new(
        Box::new(FakeBackend { sink: sink.clone() }),
        Box::new(loader),
        sweeper.clone(),
        &PlaybackSettings::default(),
    );
    Harness {
        service,
        sink,
        sweeper,
    }
}

fn track(id: &str) -> Track {
    Track::new(id, id, format!("/music/{id}.flac"))
}

fn events(rx: &Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    rx.try_iter().collect()
}

#[test]
fn seek_pause_and_replay_resume_from_the_clamped_position() {
    let mut h = harness(InstantLoader::default().with("t1", 200.0));

    h.service.play(track("t1"));
    assert!(h.service.state().is_playing);
    assert_eq!(h.service.state().position_seconds, 0.0);
    assert_eq!(h.service.state().duration_seconds, 200.0);

    h.service.seek_to(250.0);
    assert_eq!(h.service.state().position_seconds, 200.0);
    assert_eq!(h.sink.lock().unwrap().position, Duration::from_secs(200));

    h.service.pause();
    assert!(!h.service.state().is_playing);
    assert_eq!(h.service.state().position_seconds, 200.0);

    h.service.play(track("t1"));
    assert!(h.service.state().is_playing);
    assert_eq!(h.service.state().position_seconds, 200.0);
    assert_eq!(h.sink.lock().unwrap().opened, 1);
}

#[test]
fn waveform_shadows_stay_silent_while_the_owner_plays() {
    let mut h = harness(InstantLoader::default().with("t1", 200.0));
    let t2 = h.sweeper.shadow_handle("t2");
    let t3 = h.sweeper.shadow_handle("t3");

    h.service.play(track("t1"));
    t2.request_start();
    t3.request_start();
    h.service.set_volume(0.6);

    for shadow in [&t2, &t3] {
        let a = shadow.audibility();
        assert!(a.muted);
        assert_eq!(a.volume, 0.0);
    }
    assert_eq!(h.sweeper.audible_count(), 1);
    assert!(h.service.output_handle().audibility().is_audible());
}

#[test]
fn at_most_one_resource_is_audible_after_any_operation() {
    let mut h = harness(
        InstantLoader::default()
            .with("a", 120.0)
            .with("b", 90.0),
    );
    let rogue = RogueVoice::new(&h.sweeper);
    let _shadow = h.sweeper.shadow_handle("b");

    let ops: Vec<Box<dyn Fn(&mut PlaybackService)>> = vec![
        Box::new(|s: &mut PlaybackService| s.play(track("a"))),
        Box::new(|s: &mut PlaybackService| s.set_volume(1.4)),
        Box::new(|s: &mut PlaybackService| s.pause()),
        Box::new(|s: &mut PlaybackService| s.play(track("a"))),
        Box::new(|s: &mut PlaybackService| s.play(track("b"))),
        Box::new(|s: &mut PlaybackService| s.set_volume(0.3)),
        Box::new(|s: &mut PlaybackService| s.pause()),
        Box::new(|s: &mut PlaybackService| s.pause()),
        Box::new(|s: &mut PlaybackService| s.play(track("b"))),
    ];

    for op in ops {
        rogue.misbehave();
        op(&mut h.service);
        assert!(h.sweeper.audible_count() <= 1);
        assert_eq!(rogue.audibility().unwrap(), Audibility::SILENT);
    }
}

#[test]
fn playing_the_same_track_twice_is_a_toggle() {
    let loader = || InstantLoader::default().with("t", 60.0);

    let mut twice = harness(loader());
    twice.service.play(track("t"));
    twice.service.play(track("t"));

    let mut toggled = harness(loader());
    toggled.service.play(track("t"));
    toggled.service.toggle_play_pause();

    assert_eq!(twice.service.state(), toggled.service.state());
    assert_eq!(twice.service.phase(), toggled.service.phase());
    assert!(!twice.service.state().is_playing);
    assert_eq!(twice.sink.lock().unwrap().opened, 1);
}

#[test]
fn volume_is_clamped() {
    let mut h = harness(InstantLoader::default());
    h.service.set_volume(-0.5);
    assert_eq!(h.service.state().volume, 0.0);
    h.service.set_volume(3.0);
    assert_eq!(h.service.state().volume, 1.0);
    h.service.set_volume(f32::NAN);
    assert_eq!(h.service.state().volume, 0.0);
    h.service.set_volume(0.25);
    assert_eq!(h.service.state().volume, 0.25);
}

#[test]
fn seeks_outside_the_track_are_clamped() {
    let mut h = harness(InstantLoader::default().with("t", 30.0));
    h.service.play(track("t"));

    h.service.seek_to(-4.0);
    assert_eq!(h.service.state().position_seconds, 0.0);
    h.service.seek_to(f64::INFINITY);
    assert_eq!(h.service.state().position_seconds, 30.0);
    h.service.seek_to(f64::NAN);
    assert_eq!(h.service.state().position_seconds, 0.0);
}

#[test]
fn pause_without_playback_changes_nothing() {
    let mut h = harness(InstantLoader::default().with("t", 30.0));
    let rx = h.service.subscribe();
    let before = h.service.state().clone();
    h.service.pause();
    assert_eq!(h.service.state(), &before);

    h.service.play(track("t"));
    h.service.pause();
    let paused = h.service.state().clone();
    events(&rx);
    h.service.pause();
    assert_eq!(h.service.state(), &paused);
    assert!(events(&rx).is_empty());
}

#[test]
fn seek_publishes_the_position_immediately() {
    let mut h = harness(InstantLoader::default().with("t", 30.0));
    h.service.play(track("t"));
    let rx = h.service.subscribe();

    h.service.seek_to(12.5);
    assert_eq!(events(&rx), vec![PlaybackEvent::Position(12.5)]);
    assert_eq!(h.service.playback_handle().lock().unwrap().position_seconds, 12.5);
}

#[test]
fn position_updates_are_throttled() {
    let mut h = harness(InstantLoader::default().with("t", 30.0));
    h.service.play(track("t"));
    let rx = h.service.subscribe();
    let start = Instant::now();

    h.sink.lock().unwrap().position = Duration::from_secs(1);
    h.service.tick(start);
    h.sink.lock().unwrap().position = Duration::from_millis(1250);
    h.service.tick(start + Duration::from_millis(100));
    h.sink.lock().unwrap().position = Duration::from_millis(1500);
    h.service.tick(start + Duration::from_millis(300));

    assert_eq!(
        events(&rx),
        vec![PlaybackEvent::Position(1.0), PlaybackEvent::Position(1.5)]
    );
    assert_eq!(h.service.state().position_seconds, 1.5);
}

#[test]
fn a_newer_play_supersedes_an_unfinished_load() {
    let loader = ManualLoader::default();
    let mut h = harness(loader.clone());

    h.service.play(track("a"));
    h.service.play(track("b"));
    let tickets = loader.tickets();
    assert_eq!(tickets.len(), 2);
    assert_eq!(h.service.phase(), Phase::Loading);

    loader.complete(tickets[0].0, 100.0);
    h.service.tick(Instant::now());
    assert!(h.service.state().is_current("b"));
    assert_eq!(h.service.phase(), Phase::Loading);
    assert_eq!(h.sink.lock().unwrap().opened, 0);

    loader.complete(tickets[1].0, 50.0);
    h.service.tick(Instant::now());
    assert_eq!(h.service.phase(), Phase::Ready);
    assert!(h.service.state().is_playing);
    assert_eq!(h.service.state().duration_seconds, 50.0);
}

#[test]
fn intents_recorded_while_loading_apply_on_completion() {
    let loader = ManualLoader::default();
    let mut h = harness(loader.clone());

    h.service.play(track("a"));
    h.service.seek_to(40.0);
    h.service.pause();
    assert!(!h.service.state().is_playing);

    let (ticket, _) = loader.tickets()[0].clone();
    loader.complete(ticket, 30.0);
    h.service.tick(Instant::now());

    assert_eq!(h.service.phase(), Phase::Ready);
    assert!(!h.service.state().is_playing);
    assert_eq!(h.service.state().position_seconds, 30.0);
    assert!(!h.sink.lock().unwrap().playing);
}

#[test]
fn failed_load_keeps_the_track_selected() {
    let mut h = harness(InstantLoader::default().broken("bad"));
    let rx = h.service.subscribe();

    h.service.play(track("bad"));
    assert!(!h.service.state().is_playing);
    assert!(h.service.state().is_current("bad"));
    assert_eq!(h.service.phase(), Phase::Failed);
    assert!(matches!(
        h.service.last_error(),
        Some(AudioError::LoadFailed { track_id, .. }) if track_id == "bad"
    ));
    assert!(
        events(&rx)
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Failed(AudioError::LoadFailed { .. })))
    );
}

#[test]
fn failed_load_is_retried_by_toggle() {
    let mut h = harness(InstantLoader::default().with("t", 10.0));
    h.sink.lock().unwrap().fail_open = true;
    h.service.play(track("t"));
    assert_eq!(h.service.phase(), Phase::Failed);

    h.sink.lock().unwrap().fail_open = false;
    h.service.toggle_play_pause();
    assert_eq!(h.service.phase(), Phase::Ready);
    assert!(h.service.state().is_playing);
    assert!(h.service.last_error().is_none());
}

#[test]
fn refused_transport_reports_playback_blocked() {
    let mut h = harness(InstantLoader::default().with("t", 10.0));
    h.sink.lock().unwrap().refuse_play = true;

    h.service.play(track("t"));
    assert!(!h.service.state().is_playing);
    assert!(h.service.state().is_current("t"));
    assert_eq!(h.service.phase(), Phase::Ready);
    assert!(matches!(
        h.service.last_error(),
        Some(AudioError::PlaybackBlocked { .. })
    ));

    h.sink.lock().unwrap().refuse_play = false;
    h.service.toggle_play_pause();
    assert!(h.service.state().is_playing);
}

#[test]
fn finished_track_is_reprimed_paused_at_zero() {
    let mut h = harness(InstantLoader::default().with("t", 10.0));
    h.service.play(track("t"));
    let rx = h.service.subscribe();

    h.sink.lock().unwrap().finished = true;
    h.service.tick(Instant::now());

    let seen = events(&rx);
    assert!(seen.contains(&PlaybackEvent::Ended));
    assert!(seen.contains(&PlaybackEvent::Playing(false)));
    assert_eq!(h.service.phase(), Phase::Ready);
    assert!(!h.service.state().is_playing);
    assert_eq!(h.service.state().position_seconds, 0.0);
    assert_eq!(h.sink.lock().unwrap().opened, 2);

    h.service.play(track("t"));
    assert!(h.service.state().is_playing);
}

#[test]
fn stop_clears_the_selection() {
    let mut h = harness(InstantLoader::default().with("t", 10.0));
    h.service.set_volume(0.4);
    h.service.play(track("t"));
    h.service.stop();

    assert_eq!(h.service.phase(), Phase::Empty);
    assert_eq!(h.service.state(), &PlaybackState::empty(0.4));
    h.service.toggle_play_pause();
    assert!(!h.service.state().is_playing);
}

#[test]
fn analyzer_attaches_to_the_service_output_once() {
    let h = harness(InstantLoader::default());
    let mut analyzer = AudioGraphAnalyzer::new(&AnalyzerSettings::default());
    analyzer.attach(h.service.output_handle()).unwrap();
    assert!(matches!(
        analyzer.attach(h.service.output_handle()),
        Err(GraphAttachError::AlreadyAttached(_))
    ));
}

#[test]
fn shutdown_releases_the_output() {
    let mut h = harness(InstantLoader::default().with("t", 10.0));
    let mut analyzer = AudioGraphAnalyzer::new(&AnalyzerSettings::default());
    analyzer.attach(h.service.output_handle()).unwrap();
    h.service.play(track("t"));

    h.service.shutdown();
    assert!(h.service.output_handle().is_released());
    assert!(!analyzer.is_attached());
    assert_eq!(h.sweeper.audible_count(), 0);
}
