use std::time::{Duration, Instant};

use ratatui::{Terminal, backend::TestBackend, buffer::Buffer, layout::Rect, style::Color};

use super::*;
use crate::app::App;
use crate::audio::{Phase, PlaybackState};
use crate::config::{ControlsSettings, UiSettings, VisualizerSettings};
use crate::library::Track;
use crate::visual::VisualizationRenderer;

fn track() -> Track {
    let mut t = Track::new("/music/a.flac", "Intro", "/music/a.flac").with_artist("Band");
    t.display = "Band - Intro".into();
    t.meta.bpm = Some(124.0);
    t.meta.key = Some("8A".into());
    t.meta.collaborators = vec!["Remixer".into()];
    t
}

#[test]
fn term_surface_paints_cells_inside_its_area() {
    let mut buf = Buffer::empty(Rect::new(0, 0, 10, 6));
    let mut surface = TermSurface::new(&mut buf, Rect::new(2, 1, 4, 3));
    assert_eq!((surface.width(), surface.height()), (4, 3));

    surface.fill_rect(1, 1, 10, 10, Rgb(1, 2, 3));
    surface.fill_rect(0, 0, 1, 1, Rgb(9, 9, 9));

    assert_eq!(buf[(3, 2)].symbol(), BAR_SYMBOL);
    assert_eq!(buf[(3, 2)].fg, Color::Rgb(1, 2, 3));
    assert_eq!(buf[(5, 3)].fg, Color::Rgb(1, 2, 3));
    assert_eq!(buf[(2, 1)].fg, Color::Rgb(9, 9, 9));
    // Clipped to the area.
    assert_eq!(buf[(6, 3)].symbol(), " ");
    assert_eq!(buf[(3, 4)].symbol(), " ");

    let mut surface = TermSurface::new(&mut buf, Rect::new(2, 1, 4, 3));
    surface.clear();
    assert_eq!(buf[(3, 2)].symbol(), " ");
}

#[test]
fn mouse_fractions_only_inside_the_strip() {
    let areas = UiAreas {
        waveform: Rect::new(10, 5, 20, 3),
        visualizer: Rect::default(),
    };
    assert_eq!(areas.waveform_fraction(9, 5), None);
    assert_eq!(areas.waveform_fraction(10, 8), None);
    assert_eq!(areas.waveform_fraction(10, 5), Some(0.025));
    assert_eq!(areas.waveform_fraction(19, 6), Some(0.475));
    assert_eq!(areas.visualizer_fraction(0, 0), None);
}

#[test]
fn time_text_skips_totals_while_unknown() {
    let ui = UiSettings::default();
    let text = now_playing_time_text(Duration::from_secs(65), Duration::from_secs(200), &ui);
    assert_eq!(text.as_deref(), Some("01:05 / 03:20 / -02:15"));

    let text = now_playing_time_text(Duration::from_secs(65), Duration::ZERO, &ui);
    assert_eq!(text.as_deref(), Some("01:05"));
}

#[test]
fn status_shows_phase_volume_and_errors() {
    let t = track();
    let mut app = App::new(vec![t.clone()]);
    let ui = UiSettings::default();
    assert!(status_text(&app, &ui).contains("Stopped"));

    app.apply_playback(
        PlaybackState {
            current_track: Some(t),
            is_playing: true,
            volume: 0.5,
            position_seconds: 3.0,
            duration_seconds: 10.0,
        },
        Phase::Ready,
    );
    app.set_status("failed to load x: nope");
    let status = status_text(&app, &ui);
    assert!(status.contains("Song: Band - Intro [00:03 / 00:10 / -00:07]"));
    assert!(status.contains("Playing"));
    assert!(status.contains("Vol: 50%"));
    assert!(status.contains("Error: failed to load x: nope"));
}

#[test]
fn metadata_lists_musical_fields() {
    let text = metadata_text(&track());
    assert!(text.contains("BPM: 124"));
    assert!(text.contains("Key: 8A"));
    assert!(text.contains("Genre: -"));
    assert!(text.contains("With: Remixer"));
}

#[test]
fn controls_mention_configured_steps() {
    let text = controls_text(&ControlsSettings {
        scrub_seconds: 10,
        volume_step: 0.1,
    });
    assert!(text.contains("[H/L] scrub -/+10s"));
    assert!(text.contains("[+/-] volume 10%"));
    assert!(text.contains("[v] colors"));
}

#[test]
fn full_frame_draws_and_reports_areas() {
    let mut terminal = Terminal::new(TestBackend::new(100, 50)).unwrap();
    let app = App::new(vec![track()]);
    let display = app.display_indices();
    let mut renderer = VisualizationRenderer::new(VisualizerSettings::default());
    renderer.sync(true);
    let bins = vec![0.5f32; 64];

    let mut areas = UiAreas::default();
    terminal
        .draw(|f| {
            areas = draw(
                f,
                &app,
                &display,
                &mut renderer,
                &bins,
                Instant::now(),
                &UiSettings::default(),
                &ControlsSettings::default(),
            );
        })
        .unwrap();

    assert!(areas.waveform.width > 0 && areas.waveform.height > 0);
    assert!(areas.visualizer.width > 0 && areas.visualizer.height > 0);
    assert_eq!(renderer.frames_drawn(), 1);

    let buf = terminal.backend().buffer();
    let bottom = areas.visualizer.bottom() - 1;
    let painted = (areas.visualizer.left()..areas.visualizer.right())
        .filter(|&x| buf[(x, bottom)].symbol() == BAR_SYMBOL)
        .count();
    assert!(painted > 0);
}
