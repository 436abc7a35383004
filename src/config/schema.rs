use serde::{Deserialize, Serialize};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/soundstage/config.toml` or `~/.config/soundstage/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `SOUNDSTAGE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub analyzer: AnalyzerSettings,
    pub visualizer: VisualizerSettings,
    pub waveform: WaveformSettings,
    pub controls: ControlsSettings,
    pub ui: UiSettings,
    pub library: LibrarySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Session volume used until the user changes it (0.0 - 1.0).
    pub initial_volume: f32,
    /// Minimum spacing between published position updates (milliseconds).
    pub position_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            initial_volume: 0.8,
            position_interval_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Transform size; must be a power of two. Yields `fft_size / 2` bins.
    pub fft_size: usize,
    /// Blend factor with the previous frame (0 = no smoothing).
    pub smoothing: f32,
    /// Magnitudes at or below this level map to 0.
    pub min_db: f32,
    /// Magnitudes at or above this level map to 1.
    pub max_db: f32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    Flat,
    Rainbow,
    #[serde(alias = "dual-tone", alias = "dual_tone")]
    Neon,
    #[serde(alias = "mono")]
    Monochrome,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarLayout {
    Standard,
    #[serde(alias = "mirror", alias = "center")]
    Mirrored,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualizerSettings {
    pub bar_count: usize,
    /// Gap between bars as a fraction of one bar slot.
    pub bar_gap: f32,
    /// Bar height bounds as fractions of the surface height.
    pub min_bar_height: f32,
    pub max_bar_height: f32,
    /// Idle animation speed in cycles per second.
    pub speed: f32,
    pub sensitivity: f32,
    pub color_scheme: ColorScheme,
    pub layout: BarLayout,
    /// Boost bars near the pointer.
    pub interactive: bool,
    /// Boost radius as a fraction of the surface width.
    pub pointer_radius: f32,
    /// Extra gain applied right under the pointer.
    pub pointer_boost: f32,
    /// Base color for `flat`/`monochrome`, as `#rrggbb`.
    pub base_color: String,
    /// Second tone for `neon`, as `#rrggbb`.
    pub accent_color: String,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            bar_count: 48,
            bar_gap: 0.2,
            min_bar_height: 0.02,
            max_bar_height: 1.0,
            speed: 0.5,
            sensitivity: 1.0,
            color_scheme: ColorScheme::Rainbow,
            layout: BarLayout::Standard,
            interactive: true,
            pointer_radius: 0.15,
            pointer_boost: 0.6,
            base_color: "#1db954".to_string(),
            accent_color: "#ff2bd6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WaveformSettings {
    /// Number of peak/RMS columns extracted per track.
    pub peak_columns: usize,
    /// Publish partial peaks every this many decoded columns.
    pub progressive_chunk: usize,
}

impl Default for WaveformSettings {
    fn default() -> Self {
        Self {
            peak_columns: 400,
            progressive_chunk: 25,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
    /// Volume change per `+` / `-` press.
    pub volume_step: f32,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            scrub_seconds: 5,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeField {
    Elapsed,
    Total,
    Remaining,
}

#[derive(Debug, Copy, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    /// Artist and title.
    Display,
    Title,
    Artist,
    Album,
    Genre,
    Filename,
    Path,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiSettings {
    /// Whether the cursor starts in "follow playback" mode.
    pub follow_playback: bool,
    pub header_text: String,
    pub now_playing_track_fields: Vec<TrackDisplayField>,
    pub now_playing_track_separator: String,
    pub now_playing_time_fields: Vec<TimeField>,
    pub now_playing_time_separator: String,
    /// Target redraw rate while the visualizer runs.
    pub frame_rate: u32,
    /// Poll interval while nothing animates (milliseconds).
    pub idle_poll_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            follow_playback: true,
            header_text: " ~ soundstage ~ ".to_string(),
            now_playing_track_fields: vec![TrackDisplayField::Display],
            now_playing_track_separator: " - ".to_string(),
            now_playing_time_fields: vec![TimeField::Elapsed, TimeField::Total, TimeField::Remaining],
            now_playing_time_separator: " / ".to_string(),
            frame_rate: 60,
            idle_poll_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    pub follow_links: bool,
    pub include_hidden: bool,
    pub recursive: bool,
    pub max_depth: Option<usize>,
    /// Which fields build `Track.display`, in order.
    pub display_fields: Vec<TrackDisplayField>,
    pub display_separator: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into(), "flac".into(), "wav".into(), "ogg".into()],
            follow_links: true,
            include_hidden: true,
            recursive: true,
            max_depth: None,
            display_fields: vec![TrackDisplayField::Artist, TrackDisplayField::Title],
            display_separator: " - ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset (`error`, `warn`, `info`, `debug`, `trace`, `off`).
    pub level: String,
    /// Log destination. The terminal belongs to the UI, so nothing is written
    /// unless a file is configured.
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
