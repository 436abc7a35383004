use std::time::{Duration, Instant};

use crate::config::{BarLayout, ColorScheme, VisualizerSettings};

use super::bars::{self, IDLE_AMPLITUDE};
use super::*;

fn settings() -> VisualizerSettings {
    VisualizerSettings {
        bar_count: 8,
        bar_gap: 0.0,
        min_bar_height: 0.1,
        max_bar_height: 0.9,
        interactive: false,
        ..VisualizerSettings::default()
    }
}

#[test]
fn idle_term_is_a_bounded_pure_function() {
    for i in 0..32 {
        for step in 0..200 {
            let t = step as f32 * 0.05;
            let a = idle_term(t, i, 0.5);
            assert_eq!(a, idle_term(t, i, 0.5));
            assert!((0.0..=IDLE_AMPLITUDE).contains(&a), "{a} at t={t} i={i}");
        }
    }
    let samples: Vec<f32> = (0..40).map(|s| idle_term(s as f32 * 0.1, 3, 0.5)).collect();
    assert!(samples.windows(2).any(|w| w[0] != w[1]));
}

#[test]
fn pointer_gain_decays_linearly_to_the_radius() {
    let g = |center: f32| pointer_gain(center, Some(0.5), 0.2, 0.6);
    assert!((g(0.5) - 1.6).abs() < 1e-6);
    assert!((g(0.6) - 1.3).abs() < 1e-6);
    assert!((g(0.4) - 1.3).abs() < 1e-6);
    assert_eq!(g(0.75), 1.0);
    assert_eq!(g(0.05), 1.0);
    assert_eq!(pointer_gain(0.5, None, 0.2, 0.6), 1.0);
}

#[test]
fn bar_heights_are_clamped() {
    assert_eq!(bars::bar_height(1.0, 0.05, 5.0, 1.6, 0.1, 0.9), 0.9);
    assert_eq!(bars::bar_height(0.0, 0.0, 1.0, 1.0, 0.1, 0.9), 0.1);
    assert_eq!(bars::bar_height(f32::NAN, 0.0, 1.0, 1.0, 0.1, 0.9), 0.1);
    assert!((bars::bar_height(0.3, 0.1, 1.0, 1.0, 0.0, 1.0) - 0.4).abs() < 1e-6);
}

#[test]
fn grouping_keeps_the_loudest_bin_of_each_range() {
    let mut bins = vec![0.0; 64];
    bins[0] = 0.9;
    bins[63] = 0.7;
    let grouped = bars::group_bins(&bins, 8);
    assert_eq!(grouped.len(), 8);
    assert_eq!(grouped[0], 0.9);
    assert_eq!(grouped[7], 0.7);
    assert!(grouped[1..7].iter().all(|b| *b == 0.0));

    assert_eq!(bars::group_bins(&[0.5, 0.25], 5).len(), 5);
    assert_eq!(bars::group_bins(&[], 3), vec![0.0; 3]);
}

#[test]
fn mirrored_layout_grows_out_from_the_centre() {
    let order: Vec<usize> = (0..6)
        .map(|p| bars::spectral_index(p, 6, BarLayout::Mirrored))
        .collect();
    assert_eq!(order, vec![2, 1, 0, 0, 1, 2]);
    let odd: Vec<usize> = (0..5)
        .map(|p| bars::spectral_index(p, 5, BarLayout::Mirrored))
        .collect();
    assert_eq!(odd, vec![2, 1, 0, 1, 2]);
    assert_eq!(bars::spectrum_for(&[1.0; 10], BarLayout::Mirrored).len(), 5);
}

#[test]
fn stopped_renderer_does_not_draw() {
    let mut renderer = VisualizationRenderer::new(settings());
    let mut surface = PixelSurface::new(16, 10);
    assert!(!renderer.is_running());
    assert!(!renderer.frame(&mut surface, &[1.0; 32], Instant::now()));
    assert!(surface.is_blank());
    assert_eq!(renderer.frames_drawn(), 0);
}

#[test]
fn sync_starts_and_stops_the_frame_loop() {
    let mut renderer = VisualizationRenderer::new(settings());
    let mut surface = PixelSurface::new(16, 10);
    let now = Instant::now();

    assert!(renderer.sync(true));
    assert!(!renderer.sync(true));
    assert!(renderer.frame(&mut surface, &[0.5; 32], now));

    assert!(renderer.sync(false));
    assert!(!renderer.frame(&mut surface, &[0.5; 32], now));
    assert_eq!(renderer.frames_drawn(), 1);

    renderer.sync(true);
    assert!(renderer.frame(&mut surface, &[0.5; 32], now + Duration::from_millis(16)));
    assert_eq!(renderer.frames_drawn(), 2);
}

#[test]
fn silence_draws_bars_at_least_min_height() {
    let mut renderer = VisualizationRenderer::new(settings());
    renderer.sync(true);
    let mut surface = PixelSurface::new(16, 20);
    renderer.frame(&mut surface, &[0.0; 64], Instant::now());

    assert_eq!(renderer.heights().len(), 8);
    for h in renderer.heights() {
        assert!((0.1..=0.1 + IDLE_AMPLITUDE + 1e-6).contains(h), "{h}");
    }
    assert!(surface.column_height(0) >= 2);
}

#[test]
fn loud_input_is_capped_at_max_height() {
    let mut renderer = VisualizationRenderer::new(VisualizerSettings {
        sensitivity: 4.0,
        ..settings()
    });
    renderer.sync(true);
    let mut surface = PixelSurface::new(16, 10);
    renderer.frame(&mut surface, &[1.0; 64], Instant::now());

    assert!(renderer.heights().iter().all(|h| *h == 0.9));
    assert_eq!(surface.column_height(3), 9);
    assert_eq!(surface.pixel(3, 0), None);
}

#[test]
fn each_frame_starts_from_a_clear_surface() {
    let mut renderer = VisualizationRenderer::new(settings());
    renderer.sync(true);
    let mut surface = PixelSurface::new(8, 10);
    let now = Instant::now();

    renderer.frame(&mut surface, &[1.0; 64], now);
    assert_eq!(surface.column_height(0), 9);
    renderer.frame(&mut surface, &[0.0; 64], now);
    assert!(surface.column_height(0) <= 2);
}

#[test]
fn pointer_boosts_only_nearby_bars_when_interactive() {
    let base = VisualizerSettings {
        bar_count: 10,
        min_bar_height: 0.0,
        max_bar_height: 1.0,
        speed: 0.0,
        interactive: true,
        pointer_radius: 0.15,
        pointer_boost: 1.0,
        ..settings()
    };
    let now = Instant::now();
    let bins = [0.3; 40];

    let mut plain = VisualizationRenderer::new(base.clone());
    plain.sync(true);
    plain.frame(&mut PixelSurface::new(100, 50), &bins, now);

    let mut boosted = VisualizationRenderer::new(base.clone());
    boosted.sync(true);
    boosted.set_pointer(Some(0.05));
    boosted.frame(&mut PixelSurface::new(100, 50), &bins, now);

    assert!(boosted.heights()[0] > plain.heights()[0]);
    assert_eq!(boosted.heights()[9], plain.heights()[9]);

    let mut inert = VisualizationRenderer::new(VisualizerSettings {
        interactive: false,
        ..base
    });
    inert.sync(true);
    inert.set_pointer(Some(0.05));
    inert.frame(&mut PixelSurface::new(100, 50), &bins, now);
    assert_eq!(inert.heights(), plain.heights());
}

#[test]
fn mirrored_frames_are_symmetric() {
    let mut renderer = VisualizationRenderer::new(VisualizerSettings {
        layout: BarLayout::Mirrored,
        ..settings()
    });
    renderer.sync(true);
    let bins: Vec<f32> = (0..64).map(|i| i as f32 / 64.0).collect();
    renderer.frame(&mut PixelSurface::new(16, 20), &bins, Instant::now());

    let h = renderer.heights();
    for p in 0..h.len() {
        assert_eq!(h[p], h[h.len() - 1 - p]);
    }
}

#[test]
fn palettes_follow_the_scheme() {
    assert_eq!(Rgb::parse_hex("#1db954"), Some(Rgb(0x1d, 0xb9, 0x54)));
    assert_eq!(Rgb::parse_hex("ff0000"), Some(Rgb(255, 0, 0)));
    assert_eq!(Rgb::parse_hex("#12345"), None);
    assert_eq!(Rgb::parse_hex("#gg0000"), None);

    let flat = Palette::from_settings(&VisualizerSettings {
        color_scheme: ColorScheme::Flat,
        base_color: "#102030".into(),
        ..VisualizerSettings::default()
    });
    assert_eq!(flat.color_for(0, 8, 0.2), Rgb(0x10, 0x20, 0x30));
    assert_eq!(flat.color_for(7, 8, 0.9), Rgb(0x10, 0x20, 0x30));

    let neon = Palette::from_settings(&VisualizerSettings {
        color_scheme: ColorScheme::Neon,
        base_color: "#000000".into(),
        accent_color: "#ffffff".into(),
        ..VisualizerSettings::default()
    });
    assert_eq!(neon.color_for(0, 8, 0.0), Rgb(0, 0, 0));
    assert_eq!(neon.color_for(0, 8, 1.0), Rgb(255, 255, 255));

    let broken = Palette::from_settings(&VisualizerSettings {
        base_color: "green".into(),
        ..VisualizerSettings::default()
    });
    assert_eq!(broken.base, Rgb::DEFAULT_BASE);

    let mut renderer = VisualizationRenderer::new(VisualizerSettings::default());
    assert_eq!(renderer.cycle_color_scheme(), ColorScheme::Neon);
    assert_eq!(renderer.toggle_layout(), BarLayout::Mirrored);
}
