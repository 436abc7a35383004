//! Pure bar math: grouping bins into bars, the idle animation, pointer boost
//! and on-surface geometry. Nothing here touches time sources or surfaces.

use std::f32::consts::TAU;

use crate::config::BarLayout;

/// Peak contribution of the idle animation, as a fraction of full scale.
pub const IDLE_AMPLITUDE: f32 = 0.06;

/// Small oscillation that keeps bars moving at silence.
///
/// `t` is seconds since the renderer started, `index` the bar's spectral
/// index, `speed` cycles per second. Result is in `[0, IDLE_AMPLITUDE]`.
pub fn idle_term(t: f32, index: usize, speed: f32) -> f32 {
    let phase = speed * t + index as f32 * 0.137;
    let wave = 0.5 + 0.5 * (TAU * phase).sin() * (TAU * (phase * 0.31 + 0.25)).cos();
    IDLE_AMPLITUDE * wave.clamp(0.0, 1.0)
}

/// Multiplier for a bar whose centre sits at `center` (fraction of the width).
/// Falls linearly from `1 + boost` under the pointer to 1 at `radius`.
pub fn pointer_gain(center: f32, pointer: Option<f32>, radius: f32, boost: f32) -> f32 {
    let Some(pointer) = pointer else {
        return 1.0;
    };
    if radius <= 0.0 {
        return 1.0;
    }
    let distance = (center - pointer).abs();
    if distance >= radius {
        1.0
    } else {
        1.0 + boost * (1.0 - distance / radius)
    }
}

/// Bar height as a fraction of the surface, clamped to `[min, max]`.
pub fn bar_height(magnitude: f32, idle: f32, sensitivity: f32, gain: f32, min: f32, max: f32) -> f32 {
    let raw = sensitivity * (magnitude + idle) * gain;
    if raw.is_nan() {
        return min;
    }
    raw.clamp(min, max)
}

/// Collapse `bins` into `count` bars, low frequencies first.
///
/// Bar edges are spaced quadratically so the bass end, where most of the
/// musical energy lives, gets more bars than a linear split would give it.
/// Each bar takes the loudest bin of its range.
pub fn group_bins(bins: &[f32], count: usize) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    if bins.is_empty() {
        return vec![0.0; count];
    }

    let len = bins.len();
    let mut out = Vec::with_capacity(count);
    let mut start = 0usize;
    for i in 0..count {
        let f = (i + 1) as f32 / count as f32;
        let end = ((len as f32 * f * f).round() as usize).clamp(start + 1, len);
        let lo = start.min(len - 1);
        let peak = bins[lo..end.max(lo + 1)]
            .iter()
            .copied()
            .fold(0.0f32, f32::max);
        out.push(peak);
        start = end.min(len - 1);
    }
    out
}

/// Spectral index shown at screen position `position`.
///
/// `Standard` runs left to right. `Mirrored` puts index 0 at the centre and
/// grows outward to both edges.
pub fn spectral_index(position: usize, count: usize, layout: BarLayout) -> usize {
    match layout {
        BarLayout::Standard => position,
        BarLayout::Mirrored => ((2 * position + 1) as isize - count as isize).unsigned_abs() / 2,
    }
}

/// How many distinct spectral bars a layout needs for `count` positions.
pub fn spectral_count(count: usize, layout: BarLayout) -> usize {
    match layout {
        BarLayout::Standard => count,
        BarLayout::Mirrored => count.div_ceil(2),
    }
}

/// Bins a layout draws from. The mirrored layout only uses the lower half of
/// the spectrum.
pub fn spectrum_for(bins: &[f32], layout: BarLayout) -> &[f32] {
    match layout {
        BarLayout::Standard => bins,
        BarLayout::Mirrored => &bins[..bins.len().div_ceil(2)],
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BarRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Place `count` bars across a `width` x `height` surface.
///
/// Returns the horizontal extent of each bar; `gap` is the share of a slot
/// left empty. Every bar is at least one unit wide.
pub fn columns(count: usize, width: usize, gap: f32) -> Vec<(usize, usize)> {
    if count == 0 || width == 0 {
        return Vec::new();
    }
    let slot = width as f32 / count as f32;
    let bar = ((slot * (1.0 - gap.clamp(0.0, 0.95))).floor() as usize).max(1);
    (0..count)
        .map(|i| {
            let x = ((i as f32 * slot).floor() as usize).min(width - 1);
            (x, bar.min(width - x))
        })
        .collect()
}

/// Bottom-anchored rectangle for a bar of height `fraction`.
pub fn bar_rect(x: usize, width: usize, fraction: f32, surface_height: usize) -> BarRect {
    let height = ((fraction * surface_height as f32).round() as usize).min(surface_height);
    BarRect {
        x,
        y: surface_height - height,
        width,
        height,
    }
}
