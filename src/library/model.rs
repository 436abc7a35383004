use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

/// Optional musical metadata carried alongside a track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackMeta {
    pub bpm: Option<f32>,
    pub key: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub collaborators: Vec<String>,
}

/// A playable track descriptor.
///
/// Two tracks are the same track when their `id`s match; every other field is
/// descriptive. The playback service relies on this to tell "toggle the current
/// track" apart from "load something new".
#[derive(Clone, Debug)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Locator for the encoded audio, resolved by the decoder.
    pub source_url: PathBuf,
    pub cover_art_url: Option<PathBuf>,
    pub meta: TrackMeta,
    /// Duration reported by the container tags, if any.
    pub duration: Option<Duration>,
    pub display: String,
}

impl Track {
    /// Minimal descriptor; the id doubles as the display string.
    pub fn new(id: impl Into<String>, title: impl Into<String>, source_url: impl Into<PathBuf>) -> Self {
        let title = title.into();
        Self {
            id: id.into(),
            display: title.clone(),
            title,
            artist: None,
            album: None,
            source_url: source_url.into(),
            cover_art_url: None,
            meta: TrackMeta::default(),
            duration: None,
        }
    }

    #[cfg(test)]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_same_track(&self, other: &Track) -> bool {
        self.id == other.id
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
