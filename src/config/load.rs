use std::{env, path::PathBuf};

use super::schema::Settings;

const APP_DIR: &str = "soundstage";
const ENV_PREFIX: &str = "SOUNDSTAGE";
const CONFIG_PATH_VAR: &str = "SOUNDSTAGE_CONFIG_PATH";

impl Settings {
    /// Load settings from environment and optional config file.
    ///
    /// Environment variables use the `SOUNDSTAGE__` prefix, e.g.
    /// `SOUNDSTAGE__VISUALIZER__COLOR_SCHEME=neon`.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = resolve_config_path() {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject values the audio core cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        let fft = self.analyzer.fft_size;
        if !(32..=32768).contains(&fft) || !fft.is_power_of_two() {
            return Err(format!(
                "analyzer.fft_size must be a power of two in 32..=32768, got {fft}"
            ));
        }
        if !(0.0..1.0).contains(&self.analyzer.smoothing) {
            return Err("analyzer.smoothing must be in [0, 1)".to_string());
        }
        if self.analyzer.min_db >= self.analyzer.max_db {
            return Err("analyzer.min_db must be below analyzer.max_db".to_string());
        }
        if self.visualizer.bar_count == 0 {
            return Err("visualizer.bar_count must be >= 1".to_string());
        }
        let (lo, hi) = (self.visualizer.min_bar_height, self.visualizer.max_bar_height);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err("visualizer bar heights must satisfy 0 <= min <= max <= 1".to_string());
        }
        if self.waveform.peak_columns == 0 {
            return Err("waveform.peak_columns must be >= 1".to_string());
        }
        if self.ui.frame_rate == 0 {
            return Err("ui.frame_rate must be >= 1".to_string());
        }
        Ok(())
    }

    /// Render the settings back to TOML (used by `--dump-config`).
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Resolve the config path from `SOUNDSTAGE_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os(CONFIG_PATH_VAR) {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// `$XDG_CONFIG_HOME/soundstage/config.toml`, or `~/.config/soundstage/config.toml`
/// when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));

    config_home.map(|d| d.join(APP_DIR).join("config.toml"))
}
