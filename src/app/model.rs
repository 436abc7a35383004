//! Application model: `App`.
//!
//! The `App` struct holds the library, the cursor, the last published
//! playback snapshot and the widgets the UI draws around it. It never talks
//! to the output itself; the runtime forwards requests to `PlaybackService`.

use log::{debug, trace};

use crate::audio::{ExclusivitySweeper, Phase, PlaybackEvent, PlaybackState};
use crate::config::WaveformSettings;
use crate::library::Track;
use crate::waveform::WaveformWidget;

/// The main application model.
pub struct App {
    pub tracks: Vec<Track>,
    pub selected: usize,

    /// Mirror of the service's published state, refreshed every loop.
    pub playback: PlaybackState,
    pub phase: Phase,

    lower_titles: Option<Vec<String>>,

    pub follow_playback: bool,
    pub filter_mode: bool,
    pub filter_query: String,
    pub current_dir: Option<String>,
    pub metadata_window: bool,

    /// Last error worth showing, cleared when a new track starts.
    pub status: Option<String>,
    /// Waveform of the loaded track.
    pub waveform: Option<WaveformWidget>,
}

impl App {
    /// Create a new `App` with the provided list of `tracks`.
    pub fn new(tracks: Vec<Track>) -> Self {
        // Large libraries keep lowercase titles around so filtering does not
        // re-fold every title per keystroke.
        let lower_titles = if tracks.len() > 100 {
            Some(
                tracks
                    .iter()
                    .map(|t| t.display.to_ascii_lowercase())
                    .collect(),
            )
        } else {
            None
        };

        Self {
            tracks,
            selected: 0,
            playback: PlaybackState::default(),
            phase: Phase::Empty,
            lower_titles,
            follow_playback: true,
            filter_mode: false,
            filter_query: String::new(),
            current_dir: None,
            metadata_window: false,
            status: None,
            waveform: None,
        }
    }

    pub fn toggle_metadata_window(&mut self) {
        self.metadata_window = !self.metadata_window;
    }

    /// Enable following playback (cursor follows currently playing track).
    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
    }

    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
    }

    pub fn set_current_dir(&mut self, dir: String) {
        self.current_dir = Some(dir);
    }

    pub fn has_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub fn selected_track(&self) -> Option<&Track> {
        self.tracks.get(self.selected)
    }

    /// Library index of `track`, matched by id.
    pub fn index_of(&self, track: &Track) -> Option<usize> {
        self.tracks.iter().position(|t| t.is_same_track(track))
    }

    /// Library index of the track the service has loaded.
    pub fn current_index(&self) -> Option<usize> {
        self.playback
            .current_track
            .as_ref()
            .and_then(|t| self.index_of(t))
    }

    /// True when the cursor sits on the loaded track and it is playing.
    pub fn is_selected_playing(&self) -> bool {
        self.playback.is_playing && self.current_index() == Some(self.selected)
    }

    /// Take a fresh snapshot from the service. Moves the cursor onto the
    /// loaded track when following playback.
    pub fn apply_playback(&mut self, state: PlaybackState, phase: Phase) {
        self.playback = state;
        self.phase = phase;
        if !self.follow_playback || self.filter_mode {
            return;
        }
        if let Some(idx) = self.current_index() {
            if idx != self.selected {
                self.set_selected(idx);
            }
        }
    }

    /// Fold a service notification into the status line.
    pub fn note_event(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Failed(e) => self.status = Some(e.to_string()),
            PlaybackEvent::TrackChanged(_) => self.status = None,
            _ => {}
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    /// Keep `waveform` on the loaded track: remount when the track changes,
    /// drop it when nothing is loaded, then let it follow the snapshot.
    pub fn sync_waveform(&mut self, sweeper: &ExclusivitySweeper, settings: &WaveformSettings) {
        let wanted = self.playback.current_track.as_ref().map(|t| &t.source_url);
        let stale = match (&self.waveform, wanted) {
            (Some(w), Some(url)) => w.source_url() != url.as_path(),
            (None, Some(_)) => true,
            (Some(_), None) => true,
            (None, None) => false,
        };
        if stale {
            self.waveform = wanted.map(|url| {
                let label = url.display().to_string();
                WaveformWidget::mount(url.clone(), sweeper, settings)
                    .on_ready(move |seconds| debug!("waveform for {label} ready: {seconds:.1}s"))
                    .on_position_change(|seconds| trace!("waveform position {seconds:.2}s"))
            });
        }
        if let Some(w) = self.waveform.as_mut() {
            w.sync(&self.playback);
        }
    }

    /// Track indices in display order, narrowed by the active filter.
    pub fn display_indices(&self) -> Vec<usize> {
        let base = 0..self.tracks.len();
        let query = self.filter_query.trim();
        if query.is_empty() {
            return base.collect();
        }
        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                let query_lower = query.to_ascii_lowercase();
                base.filter(|&i| {
                    Self::fuzzy_match_positions_lower(&lower_titles[i], &query_lower).is_some()
                })
                .collect()
            }
            None => base
                .filter(|&i| Self::fuzzy_match_positions(&self.tracks[i].display, query).is_some())
                .collect(),
        }
    }

    pub fn uses_lower_titles(&self) -> bool {
        self.lower_titles.is_some()
    }

    /// Fuzzy-match `query_lower` against a specific track by index.
    ///
    /// Returns the character positions that match, or `None` when there is no match.
    pub fn fuzzy_match_positions_for_track_lower(
        &self,
        track_index: usize,
        query_lower: &str,
    ) -> Option<Vec<usize>> {
        if query_lower.is_empty() {
            return Some(Vec::new());
        }

        match self.lower_titles.as_deref() {
            Some(lower_titles) => {
                Self::fuzzy_match_positions_lower(&lower_titles[track_index], query_lower)
            }
            None => Self::fuzzy_match_positions(&self.tracks[track_index].display, query_lower),
        }
    }

    /// Next visible index after `current`, wrapping to the first.
    pub fn next_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        match display.iter().position(|&i| i == current) {
            Some(p) => Some(display[(p + 1) % display.len()]),
            None => Some(display[0]),
        }
    }

    /// Previous visible index before `current`, wrapping to the last.
    pub fn prev_in_view_from(&self, current: usize) -> Option<usize> {
        let display = self.display_indices();
        if display.is_empty() {
            return None;
        }

        match display.iter().position(|&i| i == current) {
            Some(0) | None => Some(display[display.len() - 1]),
            Some(p) => Some(display[p - 1]),
        }
    }

    /// Set the selected track index and ensure it is visible in the display.
    pub fn set_selected(&mut self, idx: usize) {
        self.selected = idx;
        self.ensure_selected_visible();
    }

    /// Fuzzy/subsequence match: return the character positions in `title`
    /// that match `query`, or `None` if not matched.
    pub fn fuzzy_match_positions(title: &str, query: &str) -> Option<Vec<usize>> {
        if query.is_empty() {
            return Some(Vec::new());
        }

        let mut positions: Vec<usize> = Vec::new();
        let mut title_iter = title.chars().enumerate();

        for qc in query.chars() {
            let qc_low = qc.to_ascii_lowercase();
            loop {
                match title_iter.next() {
                    Some((ti, tc)) if tc.to_ascii_lowercase() == qc_low => {
                        positions.push(ti);
                        break;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }

        Some(positions)
    }

    fn fuzzy_match_positions_lower(title_lower: &str, query_lower: &str) -> Option<Vec<usize>> {
        if query_lower.is_empty() {
            return Some(Vec::new());
        }

        let mut positions: Vec<usize> = Vec::new();
        let mut title_iter = title_lower.chars().enumerate();

        for qc in query_lower.chars() {
            loop {
                match title_iter.next() {
                    Some((ti, tc)) if tc == qc => {
                        positions.push(ti);
                        break;
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }

        Some(positions)
    }

    pub fn enter_filter_mode(&mut self) {
        self.filter_mode = true;
        self.follow_playback_off();
        self.ensure_selected_visible();
    }

    pub fn exit_filter_mode(&mut self) {
        self.filter_mode = false;
    }

    /// Clear the active filter and restore selection visibility.
    pub fn clear_filter(&mut self) {
        self.filter_query.clear();
        self.filter_mode = false;
        self.ensure_selected_visible();
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter_query.push(c);
        self.ensure_selected_visible();
    }

    pub fn pop_filter_char(&mut self) {
        self.filter_query.pop();
        self.ensure_selected_visible();
    }

    /// Keep `selected` inside the filtered view, falling back to its first row.
    fn ensure_selected_visible(&mut self) {
        let display = self.display_indices();
        if display.is_empty() {
            self.selected = 0;
            return;
        }

        if !display.contains(&self.selected) {
            self.selected = display[0];
        }
    }

    /// Move selection to the next visible track.
    pub fn next(&mut self) {
        if let Some(next) = self.next_in_view_from(self.selected) {
            self.selected = next;
        }
    }

    /// Move selection to the previous visible track.
    pub fn prev(&mut self) {
        if let Some(prev) = self.prev_in_view_from(self.selected) {
            self.selected = prev;
        }
    }
}
