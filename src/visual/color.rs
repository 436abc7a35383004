use log::warn;

use crate::config::{ColorScheme, VisualizerSettings};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const DEFAULT_BASE: Rgb = Rgb(0x1d, 0xb9, 0x54);
    pub const DEFAULT_ACCENT: Rgb = Rgb(0xff, 0x2b, 0xd6);

    /// Parse `#rrggbb` (the `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    pub fn scale(self, k: f32) -> Rgb {
        let k = k.clamp(0.0, 1.0);
        let s = |c: u8| (c as f32 * k).round() as u8;
        Rgb(s(self.0), s(self.1), s(self.2))
    }

    /// Fully saturated color for `hue` in degrees.
    pub fn from_hue(hue: f32) -> Rgb {
        let h = hue.rem_euclid(360.0) / 60.0;
        let x = 1.0 - (h % 2.0 - 1.0).abs();
        let (r, g, b) = match h as u32 {
            0 => (1.0, x, 0.0),
            1 => (x, 1.0, 0.0),
            2 => (0.0, 1.0, x),
            3 => (0.0, x, 1.0),
            4 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        let to_u8 = |c: f32| (c * 255.0).round() as u8;
        Rgb(to_u8(r), to_u8(g), to_u8(b))
    }
}

/// Resolved colors of one scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub scheme: ColorScheme,
    pub base: Rgb,
    pub accent: Rgb,
}

impl Palette {
    pub fn from_settings(settings: &VisualizerSettings) -> Self {
        Self {
            scheme: settings.color_scheme,
            base: parse_or(&settings.base_color, Rgb::DEFAULT_BASE, "base_color"),
            accent: parse_or(&settings.accent_color, Rgb::DEFAULT_ACCENT, "accent_color"),
        }
    }

    /// Color of the bar at screen `position` out of `count`, whose height is
    /// `level` (fraction of the surface).
    pub fn color_for(&self, position: usize, count: usize, level: f32) -> Rgb {
        match self.scheme {
            ColorScheme::Flat => self.base,
            ColorScheme::Rainbow => {
                let span = count.max(1) as f32;
                Rgb::from_hue(300.0 * position as f32 / span)
            }
            ColorScheme::Neon => self.base.lerp(self.accent, level),
            ColorScheme::Monochrome => self.base.scale(0.35 + 0.65 * level.clamp(0.0, 1.0)),
        }
    }
}

fn parse_or(value: &str, fallback: Rgb, field: &str) -> Rgb {
    Rgb::parse_hex(value).unwrap_or_else(|| {
        warn!("visualizer.{field} {value:?} is not a #rrggbb color; using default");
        fallback
    })
}

/// Next scheme in the `v` key cycle.
pub fn next_scheme(scheme: ColorScheme) -> ColorScheme {
    match scheme {
        ColorScheme::Flat => ColorScheme::Rainbow,
        ColorScheme::Rainbow => ColorScheme::Neon,
        ColorScheme::Neon => ColorScheme::Monochrome,
        ColorScheme::Monochrome => ColorScheme::Flat,
    }
}
