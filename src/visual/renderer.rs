use std::time::Instant;

use log::debug;

use crate::config::{BarLayout, ColorScheme, VisualizerSettings};

use super::bars;
use super::color::{Palette, next_scheme};
use super::surface::Surface;

/// Turns analyzer bins into bars on a `Surface`, once per display frame.
///
/// The renderer only reads: it never touches playback. Its frame loop is
/// either running or stopped; the host follows `is_running` to decide whether
/// to schedule frames at all.
pub struct VisualizationRenderer {
    settings: VisualizerSettings,
    palette: Palette,
    epoch: Instant,
    running: bool,
    pointer: Option<f32>,
    heights: Vec<f32>,
    frames: u64,
}

impl VisualizationRenderer {
    pub fn new(settings: VisualizerSettings) -> Self {
        let palette = Palette::from_settings(&settings);
        Self {
            settings,
            palette,
            epoch: Instant::now(),
            running: false,
            pointer: None,
            heights: Vec::new(),
            frames: 0,
        }
    }

    /// Follow the playing flag: start the loop on play, stop it on pause.
    /// Returns true when the loop changed state.
    pub fn sync(&mut self, is_playing: bool) -> bool {
        if self.running == is_playing {
            return false;
        }
        self.running = is_playing;
        debug!(
            "visualizer frame loop {}",
            if is_playing { "started" } else { "stopped" }
        );
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pointer position as a fraction of the surface width, or `None` when it
    /// left the surface. Ignored unless interactive.
    pub fn set_pointer(&mut self, pointer: Option<f32>) {
        self.pointer = if self.settings.interactive {
            pointer.filter(|p| p.is_finite()).map(|p| p.clamp(0.0, 1.0))
        } else {
            None
        };
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.settings.color_scheme
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) {
        self.settings.color_scheme = scheme;
        self.palette.scheme = scheme;
    }

    pub fn cycle_color_scheme(&mut self) -> ColorScheme {
        let next = next_scheme(self.settings.color_scheme);
        self.set_color_scheme(next);
        next
    }

    pub fn layout(&self) -> BarLayout {
        self.settings.layout
    }

    pub fn toggle_layout(&mut self) -> BarLayout {
        self.settings.layout = match self.settings.layout {
            BarLayout::Standard => BarLayout::Mirrored,
            BarLayout::Mirrored => BarLayout::Standard,
        };
        self.settings.layout
    }

    /// Bar heights of the last drawn frame, as fractions of the surface.
    #[cfg(test)]
    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    /// Draw one frame. Does nothing and returns false while stopped.
    pub fn frame(&mut self, surface: &mut dyn Surface, bins: &[f32], now: Instant) -> bool {
        if !self.running {
            return false;
        }
        surface.clear();

        let width = surface.width();
        let height = surface.height();
        if width == 0 || height == 0 {
            self.heights.clear();
            return true;
        }

        let s = &self.settings;
        let count = s.bar_count.clamp(1, width);
        let spectral = bars::group_bins(
            bars::spectrum_for(bins, s.layout),
            bars::spectral_count(count, s.layout),
        );
        let t = now.saturating_duration_since(self.epoch).as_secs_f32();

        self.heights.clear();
        for (position, (x, bar_width)) in bars::columns(count, width, s.bar_gap)
            .into_iter()
            .enumerate()
        {
            let index = bars::spectral_index(position, count, s.layout);
            let magnitude = spectral.get(index).copied().unwrap_or(0.0);
            let center = (x as f32 + bar_width as f32 / 2.0) / width as f32;
            let gain = bars::pointer_gain(center, self.pointer, s.pointer_radius, s.pointer_boost);
            let level = bars::bar_height(
                magnitude,
                bars::idle_term(t, index, s.speed),
                s.sensitivity,
                gain,
                s.min_bar_height,
                s.max_bar_height,
            );
            self.heights.push(level);

            let rect = bars::bar_rect(x, bar_width, level, height);
            let color = self.palette.color_for(position, count, level);
            surface.fill_rect(rect.x, rect.y, rect.width, rect.height, color);
        }

        self.frames += 1;
        true
    }
}
