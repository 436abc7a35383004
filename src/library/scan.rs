use std::path::{Path, PathBuf};

use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use walkdir::WalkDir;

use crate::config::LibrarySettings;

use super::display::display_from_fields;
use super::model::{Track, TrackMeta};

const COVER_NAMES: [&str; 6] = [
    "cover.jpg",
    "cover.png",
    "folder.jpg",
    "folder.png",
    "front.jpg",
    "front.png",
];

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .any(|e| !e.is_empty() && e == ext)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Look for a conventional cover image next to the audio file.
fn find_cover_art(path: &Path) -> Option<PathBuf> {
    let dir = path.parent()?;
    COVER_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn parse_year(raw: &str) -> Option<u32> {
    // Tags store years as "1999", "1999-04-12" or similar.
    raw.trim().get(..4).and_then(|y| y.parse().ok())
}

fn parse_bpm(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|b| *b > 0.0)
}

/// Build a `Track` for `path`, filling whatever tags can be read.
///
/// Unreadable files still produce a track titled after the file stem; whether
/// they decode is the player's problem, not the scanner's.
pub fn read_track(path: &Path, settings: &LibrarySettings) -> Track {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let mut track = Track::new(path.to_string_lossy(), stem, path);
    track.cover_art_url = find_cover_art(path);

    if let Ok(tagged) = lofty::read_from_path(path) {
        track = track.with_duration(tagged.properties().duration());

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            let get = |key: &ItemKey| {
                tag.get_string(key)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            if let Some(v) = get(&ItemKey::TrackTitle) {
                track.title = v;
            }
            track.artist = get(&ItemKey::TrackArtist);
            track.album = get(&ItemKey::AlbumTitle);

            let mut meta = TrackMeta {
                bpm: get(&ItemKey::Bpm)
                    .or_else(|| get(&ItemKey::IntegerBpm))
                    .and_then(|v| parse_bpm(&v)),
                key: get(&ItemKey::InitialKey),
                genre: get(&ItemKey::Genre),
                year: get(&ItemKey::Year)
                    .or_else(|| get(&ItemKey::RecordingDate))
                    .and_then(|v| parse_year(&v)),
                collaborators: Vec::new(),
            };
            for key in [ItemKey::Composer, ItemKey::Remixer, ItemKey::Producer] {
                if let Some(name) = get(&key) {
                    if !meta.collaborators.contains(&name) {
                        meta.collaborators.push(name);
                    }
                }
            }
            track.meta = meta;
        }
    }

    track.display = display_from_fields(
        &track,
        &settings.display_fields,
        &settings.display_separator,
    );
    track
}

pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut tracks: Vec<Track> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file() && is_audio_file(entry.path(), settings))
        .map(|entry| read_track(entry.path(), settings))
        .collect();

    tracks.sort_by(|a, b| a.display.to_lowercase().cmp(&b.display.to_lowercase()));
    log::debug!("scanned {} tracks under {}", tracks.len(), dir.display());
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackDisplayField;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn is_audio_file_matches_configured_extensions_case_insensitive() {
        let settings = LibrarySettings::default();
        assert!(is_audio_file(Path::new("/tmp/a.mp3"), &settings));
        assert!(is_audio_file(Path::new("/tmp/a.FLAC"), &settings));
        assert!(!is_audio_file(Path::new("/tmp/a.txt"), &settings));
        assert!(!is_audio_file(Path::new("/tmp/a"), &settings));
    }

    #[test]
    fn parse_helpers_accept_common_tag_shapes() {
        assert_eq!(parse_year("1999-04-12"), Some(1999));
        assert_eq!(parse_year(" 2004 "), Some(2004));
        assert_eq!(parse_year("soon"), None);
        assert_eq!(parse_bpm("128"), Some(128.0));
        assert_eq!(parse_bpm("0"), None);
    }

    #[test]
    fn scan_uses_path_as_id_and_picks_up_cover_art() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.MP3"), b"not a real mp3").unwrap();
        fs::write(dir.path().join("A.ogg"), b"not a real ogg").unwrap();
        fs::write(dir.path().join("c.txt"), b"ignore me").unwrap();
        fs::write(dir.path().join("cover.jpg"), b"jpeg").unwrap();

        let settings = LibrarySettings {
            display_fields: vec![TrackDisplayField::Title],
            ..LibrarySettings::default()
        };
        let tracks = scan(dir.path(), &settings);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "A");
        assert_eq!(tracks[1].title, "b");
        assert_eq!(tracks[0].id, dir.path().join("A.ogg").to_string_lossy());
        assert_eq!(tracks[0].cover_art_url, Some(dir.path().join("cover.jpg")));
        assert_ne!(tracks[0], tracks[1]);
    }

    #[test]
    fn scan_respects_include_hidden_false() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".hidden.mp3"), b"not real").unwrap();
        fs::write(dir.path().join("visible.mp3"), b"not real").unwrap();

        let settings = LibrarySettings {
            include_hidden: false,
            display_fields: vec![TrackDisplayField::Filename],
            ..LibrarySettings::default()
        };
        let tracks = scan(dir.path(), &settings);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].display, "visible");
    }

    #[test]
    fn scan_respects_recursive_false() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("root.mp3"), b"not real").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("child.mp3"), b"not real").unwrap();

        let settings = LibrarySettings {
            recursive: false,
            display_fields: vec![TrackDisplayField::Filename],
            ..LibrarySettings::default()
        };
        let tracks = scan(dir.path(), &settings);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].display, "root");
    }
}
