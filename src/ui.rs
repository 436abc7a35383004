//! UI rendering for the terminal user interface.
//!
//! Everything here draws from `App` and the renderer; nothing in this module
//! changes playback.

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Borders, Clear, List, ListItem, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration, time::Instant};

use crate::app::App;
use crate::audio::Phase;
use crate::config::{ControlsSettings, TimeField, TrackDisplayField, UiSettings};
use crate::library::Track;
use crate::visual::{Rgb, Surface, VisualizationRenderer};
use crate::waveform::{PeakColumn, fit_columns};

static CONTROLS_MAP: LazyLock<BTreeMap<String, String>> = LazyLock::new(|| {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    map.insert("j/k".to_string(), "up/down".to_string());
    map.insert("gg/G".to_string(), "top/bottom".to_string());
    map.insert("enter".to_string(), "play selected song".to_string());
    map.insert("space/p".to_string(), "play/pause".to_string());
    map.insert("h/l".to_string(), "prev/next song".to_string());
    // H/L and +/- are filled dynamically from config.
    map.insert("v".to_string(), "colors".to_string());
    map.insert("m".to_string(), "mirror bars".to_string());
    map.insert("/".to_string(), "filter".to_string());
    map.insert("K".to_string(), "metadata".to_string());
    map.insert("q".to_string(), "quit".to_string());
    map
});

const WAVE_PLAYED: Color = Color::Rgb(0x1d, 0xb9, 0x54);
const WAVE_REST: Color = Color::Rgb(0x5a, 0x5a, 0x5a);
const BAR_SYMBOL: &str = "█";

/// Screen regions the runtime needs for mouse hit-testing.
#[derive(Debug, Copy, Clone, Default)]
pub struct UiAreas {
    /// Inner area of the waveform strip.
    pub waveform: Rect,
    /// Inner area of the visualizer.
    pub visualizer: Rect,
}

impl UiAreas {
    /// Horizontal position of `(column, row)` within the waveform strip, as a
    /// fraction in `[0, 1]`.
    pub fn waveform_fraction(&self, column: u16, row: u16) -> Option<f64> {
        fraction_in(self.waveform, column, row)
    }

    /// Like `waveform_fraction`, but any row counts and columns past either
    /// end clamp to it, so a drag can leave the strip.
    pub fn waveform_drag_fraction(&self, column: u16) -> Option<f64> {
        let strip = self.waveform;
        if strip.width == 0 || strip.height == 0 {
            return None;
        }
        let column = column.clamp(strip.left(), strip.right() - 1);
        fraction_in(strip, column, strip.y)
    }

    pub fn visualizer_fraction(&self, column: u16, row: u16) -> Option<f32> {
        fraction_in(self.visualizer, column, row).map(|f| f as f32)
    }
}

fn fraction_in(area: Rect, column: u16, row: u16) -> Option<f64> {
    if area.width == 0 || !area.contains(Position::new(column, row)) {
        return None;
    }
    let offset = f64::from(column - area.x) + 0.5;
    Some((offset / f64::from(area.width)).clamp(0.0, 1.0))
}

/// A ratatui buffer region the visualizer paints into, one cell per pixel.
pub struct TermSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
}

impl<'a> TermSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        let area = area.intersection(buf.area);
        Self { buf, area }
    }
}

impl Surface for TermSurface<'_> {
    fn width(&self) -> usize {
        usize::from(self.area.width)
    }

    fn height(&self) -> usize {
        usize::from(self.area.height)
    }

    fn clear(&mut self) {
        for y in self.area.top()..self.area.bottom() {
            for x in self.area.left()..self.area.right() {
                if let Some(cell) = self.buf.cell_mut((x, y)) {
                    cell.reset();
                }
            }
        }
    }

    fn fill_rect(&mut self, x: usize, y: usize, width: usize, height: usize, color: Rgb) {
        let Rgb(r, g, b) = color;
        let x_end = (x + width).min(self.width());
        let y_end = (y + height).min(self.height());
        for row in y..y_end {
            for col in x..x_end {
                // Both bounded by the area, which fits in u16.
                let pos = (self.area.x + col as u16, self.area.y + row as u16);
                if let Some(cell) = self.buf.cell_mut(pos) {
                    cell.set_symbol(BAR_SYMBOL).set_fg(Color::Rgb(r, g, b));
                }
            }
        }
    }
}

/// Render the controls help text, incorporating scrub seconds and volume step.
fn controls_text(controls: &ControlsSettings) -> String {
    let order = [
        "j/k", "h/l", "H/L", "+/-", "enter", "space/p", "gg/G", "v", "m", "K", "/", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] scrub -/+{}s", controls.scrub_seconds)),
            "+/-" => Some(format!(
                "[+/-] volume {:.0}%",
                controls.volume_step * 100.0
            )),
            _ => CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v)),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn seconds(s: f64) -> Duration {
    Duration::try_from_secs_f64(s).unwrap_or_default()
}

/// Build the "now playing" track text according to `ui` settings.
fn now_playing_track_text(track: &Track, ui: &UiSettings) -> String {
    let mut parts: Vec<String> = Vec::new();
    let non_empty = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    for f in &ui.now_playing_track_fields {
        let part = match f {
            TrackDisplayField::Display => non_empty(Some(track.display.as_str())),
            TrackDisplayField::Title => non_empty(Some(track.title.as_str())),
            TrackDisplayField::Artist => non_empty(track.artist.as_deref()),
            TrackDisplayField::Album => non_empty(track.album.as_deref()),
            TrackDisplayField::Genre => non_empty(track.meta.genre.as_deref()),
            TrackDisplayField::Filename => {
                non_empty(track.source_url.file_stem().and_then(|s| s.to_str()))
            }
            TrackDisplayField::Path => Some(track.source_url.display().to_string()),
        };
        parts.extend(part);
    }

    if parts.is_empty() {
        track.display.clone()
    } else {
        parts.join(&ui.now_playing_track_separator)
    }
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
/// A zero total means the length is not known yet.
fn now_playing_time_text(elapsed: Duration, total: Duration, ui: &UiSettings) -> Option<String> {
    let total = (!total.is_zero()).then_some(total);
    let mut parts: Vec<String> = Vec::new();
    for f in &ui.now_playing_time_fields {
        match f {
            TimeField::Elapsed => parts.push(format_mmss(elapsed)),
            TimeField::Total => {
                if let Some(t) = total {
                    parts.push(format_mmss(t));
                }
            }
            TimeField::Remaining => {
                if let Some(t) = total {
                    parts.push(format!("-{}", format_mmss(t.saturating_sub(elapsed))));
                }
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

fn phase_text(app: &App) -> &'static str {
    match app.phase {
        Phase::Empty => "Stopped",
        Phase::Loading => "Loading",
        Phase::Ended => "Ended",
        Phase::Failed => "Failed",
        Phase::Ready if app.playback.is_playing => "Playing",
        Phase::Ready => "Paused",
    }
}

fn status_text(app: &App, ui: &UiSettings) -> String {
    let mut parts: Vec<String> = Vec::new();

    if app.follow_playback {
        parts.push(" CURSOR: Follow".to_string());
    } else {
        parts.push(" CURSOR: Free-roam".to_string());
    }

    let q = app.filter_query.trim();
    if app.filter_mode || !q.is_empty() {
        let mut filter_part = String::from("FILTER:");
        if !q.is_empty() {
            filter_part.push(' ');
            filter_part.push_str(q);
        }
        parts.push(filter_part);
    }

    let state = &app.playback;
    match state.current_track.as_ref() {
        Some(track) => {
            let song = now_playing_track_text(track, ui);
            let time = now_playing_time_text(
                seconds(state.position_seconds),
                seconds(state.duration_seconds),
                ui,
            );
            match time {
                Some(time) => parts.push(format!("Song: {} [{}]", song, time)),
                None => parts.push(format!("Song: {}", song)),
            }
            parts.push(phase_text(app).to_string());
        }
        None => parts.push(phase_text(app).to_string()),
    }

    parts.push(format!("Vol: {:.0}%", state.volume * 100.0));

    if let Some(dir) = &app.current_dir {
        parts.push(format!("Dir: {}", dir));
    }
    if let Some(err) = &app.status {
        parts.push(format!("Error: {}", err));
    }

    parts.join(" • ")
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

/// Format an optional duration, rounding up partial seconds, showing total seconds.
fn format_duration_mmss_ceil(d: Option<Duration>) -> String {
    let Some(d) = d else {
        return "-".to_string();
    };

    let mut total_secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        total_secs = total_secs.saturating_add(1);
    }

    format!("{}:{:02} ({}s)", total_secs / 60, total_secs % 60, total_secs)
}

fn metadata_text(track: &Track) -> String {
    let meta = &track.meta;
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    let collaborators = if meta.collaborators.is_empty() {
        "-".to_string()
    } else {
        meta.collaborators.join(", ")
    };
    format!(
        "Title: {}\nArtist: {}\nAlbum: {}\nDuration: {}\nBPM: {}  Key: {}  Genre: {}  Year: {}\nWith: {}\nPath: {}",
        track.title,
        track.artist.as_deref().unwrap_or("-"),
        track.album.as_deref().unwrap_or("-"),
        format_duration_mmss_ceil(track.duration),
        or_dash(meta.bpm.map(|b| format!("{b:.0}"))),
        or_dash(meta.key.clone()),
        or_dash(meta.genre.clone()),
        or_dash(meta.year.map(|y| y.to_string())),
        collaborators,
        track.source_url.display()
    )
}

/// Paint peak columns as a symmetric strip around the middle row, with the
/// played part in a brighter color.
fn waveform_title(app: &App) -> String {
    match app.waveform.as_ref() {
        Some(w) if w.is_dragging() => " waveform (scrubbing) ".to_string(),
        Some(w) if !w.is_complete() => format!(
            " waveform (decoding {}) ",
            format_mmss(w.shadow().position())
        ),
        _ => " waveform ".to_string(),
    }
}

fn draw_waveform(buf: &mut Buffer, area: Rect, columns: &[PeakColumn], progress: Option<f64>) {
    if area.width == 0 || area.height == 0 || columns.is_empty() {
        return;
    }
    let fitted = fit_columns(columns, usize::from(area.width));
    let played = progress.map_or(0, |p| (p * f64::from(area.width)).round() as usize);
    let rows = f32::from(area.height);

    for (i, column) in fitted.iter().enumerate().take(usize::from(area.width)) {
        let lit = ((column.peak.clamp(0.0, 1.0) * rows).ceil() as u16).clamp(1, area.height);
        let top = area.y + (area.height - lit) / 2;
        let color = if i < played { WAVE_PLAYED } else { WAVE_REST };
        for y in top..top + lit {
            if let Some(cell) = buf.cell_mut((area.x + i as u16, y)) {
                cell.set_symbol(BAR_SYMBOL).set_fg(color);
            }
        }
    }
}

/// Render the entire UI into `frame`. Returns the regions mouse input maps to.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    display: &[usize],
    renderer: &mut VisualizationRenderer,
    bins: &[f32],
    now: Instant,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) -> UiAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(3),
            Constraint::Length(5),
            Constraint::Percentage(30),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" soundstage ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status_par = Paragraph::new(status_text(app, ui_settings))
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" status "),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status_par, chunks[1]);

    // Main list
    {
        let q = app.filter_query.trim();
        let query_lower = if !q.is_empty() && app.uses_lower_titles() {
            Some(q.to_ascii_lowercase())
        } else {
            None
        };

        // Only build ListItems for the visible window, centered on the selection.
        let total = display.len();
        let list_height = usize::from(chunks[2].height.saturating_sub(2));
        let sel_pos = display.iter().position(|&i| i == app.selected).unwrap_or(0);
        let (start, end, selected_pos_in_visible) = if total <= list_height || list_height == 0 {
            (0, total, sel_pos)
        } else {
            let half = list_height / 2;
            let mut start = sel_pos.saturating_sub(half);
            if start + list_height > total {
                start = total - list_height;
            }
            (start, start + list_height, sel_pos - start)
        };

        let current = app.current_index();
        let visible_items: Vec<ListItem> = display[start..end]
            .iter()
            .map(|&i| {
                let title = &app.tracks[i].display;
                let positions = if q.is_empty() {
                    None
                } else {
                    match query_lower.as_deref() {
                        Some(ql) => app.fuzzy_match_positions_for_track_lower(i, ql),
                        None => App::fuzzy_match_positions(title, q),
                    }
                };

                let rendered = match positions {
                    Some(positions) => {
                        let mut rendered = String::new();
                        let mut pos_iter = positions.into_iter();
                        let mut next_pos = pos_iter.next();
                        for (ci, ch) in title.chars().enumerate() {
                            if next_pos == Some(ci) {
                                rendered.extend(ch.to_uppercase());
                                next_pos = pos_iter.next();
                            } else {
                                rendered.push(ch);
                            }
                        }
                        rendered
                    }
                    None => title.clone(),
                };
                let item = ListItem::new(rendered);
                if current == Some(i) {
                    item.bold()
                } else {
                    item
                }
            })
            .collect();

        let list = List::new(visible_items)
            .block(Block::default().borders(Borders::ALL).title(" tracks "))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ratatui::widgets::ListState::default();
        if total > 0 {
            state.select(Some(selected_pos_in_visible));
        }
        frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    // Waveform strip
    let wave_block = Block::default()
        .borders(Borders::ALL)
        .title(waveform_title(app));
    let wave_area = wave_block.inner(chunks[3]);
    frame.render_widget(wave_block, chunks[3]);
    match app.waveform.as_ref() {
        Some(widget) => match widget.error() {
            Some(err) => {
                frame.render_widget(Paragraph::new(format!("no waveform: {err}")), wave_area)
            }
            None => draw_waveform(
                frame.buffer_mut(),
                wave_area,
                &widget.columns(),
                widget.progress(),
            ),
        },
        None => frame.render_widget(
            Paragraph::new("nothing loaded").alignment(Alignment::Center),
            wave_area,
        ),
    }

    // Visualizer
    let vis_block = Block::default()
        .borders(Borders::ALL)
        .title(
            format!(
                " spectrum ({:?}, {:?}) ",
                renderer.color_scheme(),
                renderer.layout()
            )
            .to_lowercase(),
        );
    let vis_area = vis_block.inner(chunks[4]);
    frame.render_widget(vis_block, chunks[4]);
    let mut surface = TermSurface::new(frame.buffer_mut(), vis_area);
    if !renderer.frame(&mut surface, bins, now) {
        frame.render_widget(
            Paragraph::new("paused").alignment(Alignment::Center),
            vis_area,
        );
    }

    // Metadata popup over the list, leaving header/status/footer visible.
    if app.metadata_window {
        let popup_area = centered_rect_sized(76, 10, chunks[2]);
        frame.render_widget(Clear, popup_area);

        let meta = app
            .selected_track()
            .map(metadata_text)
            .unwrap_or_else(|| "No track selected".to_string());
        let meta_paragraph = Paragraph::new(meta)
            .block(
                Block::default()
                    .padding(Padding {
                        left: 1,
                        right: 0,
                        top: 0,
                        bottom: 0,
                    })
                    .borders(Borders::ALL)
                    .title(" metadata (K closes) "),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(meta_paragraph, popup_area);
    }

    let footer = Paragraph::new(controls_text(controls_settings))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[5]);

    UiAreas {
        waveform: wave_area,
        visualizer: vis_area,
    }
}

#[cfg(test)]
mod tests;
