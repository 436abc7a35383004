//! MPRIS D-Bus surface.
//!
//! Desktop media keys and `playerctl` talk to the player through here. Every
//! method call becomes a `ControlCmd` for the event loop; the properties are
//! served from a snapshot the loop keeps up to date through `MprisHandle`.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_io::{Timer, block_on};
use log::{debug, warn};
use zbus::object_server::SignalEmitter;
use zbus::{Connection, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::audio::{Phase, PlaybackHandle, PlaybackState};
use crate::library::Track;

const OBJECT_PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.soundstage";
const NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek in microseconds.
    Seek(i64),
    /// Absolute position in microseconds, for the track with this object path.
    SetPosition(String, i64),
    Volume(f64),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn from_state(state: &PlaybackState, phase: Phase) -> Self {
        match phase {
            Phase::Empty => Self::Stopped,
            _ if state.is_playing => Self::Playing,
            _ => Self::Paused,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

#[derive(Debug)]
enum Notify {
    Changed,
    Seeked(i64),
}

#[derive(Debug, Default)]
struct SharedState {
    playback: PlaybackStatus,
    volume: f64,
    title: Option<String>,
    artist: Vec<String>,
    album: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    track_id: Option<OwnedObjectPath>,
}

fn micros(seconds: f64) -> i64 {
    (seconds.max(0.0) * 1_000_000.0).round() as i64
}

/// Object path MPRIS clients use to name the track at `index`.
pub fn track_object_path(index: usize) -> String {
    format!("{OBJECT_PATH}/track/{index}")
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<Notify>,
}

impl MprisHandle {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Mirror the published playback state. Only status and volume changes
    /// are signalled; `Position` is read live from the playback handle.
    pub fn set_playback(&self, state: &PlaybackState, phase: Phase) {
        let status = PlaybackStatus::from_state(state, phase);
        let volume = f64::from(state.volume);
        let changed = {
            let mut s = self.lock();
            if state.duration_seconds > 0.0 {
                s.length_micros = Some(micros(state.duration_seconds));
            }
            let changed = s.playback != status || s.volume != volume;
            s.playback = status;
            s.volume = volume;
            changed
        };
        if changed {
            let _ = self.notify.send(Notify::Changed);
        }
    }

    pub fn set_track_metadata(&self, index: Option<usize>, track: Option<&Track>) {
        {
            let mut s = self.lock();
            let track_id = index.and_then(|i| OwnedObjectPath::try_from(track_object_path(i)).ok());
            if s.track_id == track_id && track.is_some() == s.title.is_some() {
                return;
            }
            s.track_id = track_id;
            s.title = track.map(|t| t.title.clone());
            s.artist = track.and_then(|t| t.artist.clone()).into_iter().collect();
            s.album = track.and_then(|t| t.album.clone());
            s.url = track.map(|t| format!("file://{}", t.source_url.display()));
            s.length_micros = track.and_then(|t| t.duration).map(|d| micros(d.as_secs_f64()));
        }
        let _ = self.notify.send(Notify::Changed);
    }

    /// Announce a jump in position (the `Seeked` signal).
    pub fn seeked(&self, position_seconds: f64) {
        let _ = self.notify.send(Notify::Seeked(micros(position_seconds)));
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {}

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "soundstage"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        ["audio/mpeg", "audio/flac", "audio/wav", "audio/ogg"]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    playback: PlaybackHandle,
}

impl PlayerIface {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn owned(value: Value<'_>) -> Option<OwnedValue> {
    OwnedValue::try_from(value).ok()
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    fn set_position(&self, track_id: ObjectPath<'_>, position: i64) {
        let _ = self
            .tx
            .send(ControlCmd::SetPosition(track_id.as_str().to_string(), position));
    }

    #[zbus(signal)]
    async fn seeked(emitter: &SignalEmitter<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        self.lock().playback.as_str()
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        let state = self.playback.lock().unwrap_or_else(|p| p.into_inner());
        micros(state.position_seconds)
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.lock().volume
    }

    #[zbus(property)]
    fn set_volume(&mut self, volume: f64) {
        let _ = self.tx.send(ControlCmd::Volume(volume));
    }

    #[zbus(property)]
    fn rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn minimum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn maximum_rate(&self) -> f64 {
        1.0
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let s = self.lock();
        let mut map = HashMap::new();
        let mut put = |key: &str, value: Option<OwnedValue>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        if let Some(id) = s.track_id.as_ref() {
            put("mpris:trackid", owned(Value::from(ObjectPath::clone(id))));
        }
        put(
            "xesam:title",
            owned(Value::from(s.title.clone().unwrap_or_default())),
        );
        if !s.artist.is_empty() {
            put("xesam:artist", owned(Value::from(s.artist.clone())));
        }
        if let Some(album) = s.album.clone() {
            put("xesam:album", owned(Value::from(album)));
        }
        if let Some(url) = s.url.clone() {
            put("xesam:url", owned(Value::from(url)));
        }
        if let Some(len) = s.length_micros {
            put("mpris:length", owned(Value::from(len)));
        }
        map
    }
}

/// Serve MPRIS on the session bus from a background thread. Failing to reach
/// the bus only disables the surface.
pub fn spawn_mpris(tx: Sender<ControlCmd>, playback: PlaybackHandle) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState::default()));
    let (notify_tx, notify_rx) = mpsc::channel::<Notify>();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("soundstage-mpris".into())
        .spawn(move || block_on(serve(tx, state_for_thread, playback, notify_rx)));
    if let Err(e) = spawned {
        warn!("MPRIS: could not start thread: {e}");
    }

    MprisHandle {
        state,
        notify: notify_tx,
    }
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    playback: PlaybackHandle,
    notify: Receiver<Notify>,
) {
    let connection = match Connection::session().await {
        Ok(c) => c,
        Err(e) => {
            warn!("MPRIS: failed to connect to session bus: {e}");
            return;
        }
    };

    if let Err(e) = connection.request_name(BUS_NAME).await {
        warn!("MPRIS: failed to acquire name: {e}");
        return;
    }

    let object_server = connection.object_server();

    if let Err(e) = object_server
        .at(OBJECT_PATH, RootIface { tx: tx.clone() })
        .await
    {
        warn!("MPRIS: failed to register root iface: {e}");
        return;
    }

    if let Err(e) = object_server
        .at(
            OBJECT_PATH,
            PlayerIface {
                tx,
                state,
                playback,
            },
        )
        .await
    {
        warn!("MPRIS: failed to register player iface: {e}");
        return;
    }

    let iface_ref = match object_server
        .interface::<_, PlayerIface>(OBJECT_PATH)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("MPRIS: player iface missing after registration: {e}");
            return;
        }
    };
    debug!("MPRIS: serving {BUS_NAME}");

    loop {
        Timer::after(NOTIFY_INTERVAL).await;

        let mut changed = false;
        let mut seeked = None;
        loop {
            match notify.try_recv() {
                Ok(Notify::Changed) => changed = true,
                Ok(Notify::Seeked(p)) => seeked = Some(p),
                Err(TryRecvError::Empty) => break,
                // The player is gone.
                Err(TryRecvError::Disconnected) => return,
            }
        }

        let emitter = iface_ref.signal_emitter();
        if changed {
            let iface = iface_ref.get().await;
            let results = [
                iface.playback_status_changed(emitter).await,
                iface.metadata_changed(emitter).await,
                iface.volume_changed(emitter).await,
            ];
            for e in results.into_iter().filter_map(Result::err) {
                debug!("MPRIS: property signal failed: {e}");
            }
        }
        if let Some(position) = seeked {
            if let Err(e) = PlayerIface::seeked(emitter, position).await {
                debug!("MPRIS: Seeked signal failed: {e}");
            }
        }
    }
}
