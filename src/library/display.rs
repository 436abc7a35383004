use crate::config::TrackDisplayField;

use super::model::Track;

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Compose a label for `track` from `fields`, joined by `sep`.
///
/// Fields with no value are skipped. Falls back to the title when nothing
/// was produced. `Display` expands to artist and title, so it can be used both
/// while building `Track.display` and for the now-playing line.
pub fn display_from_fields(track: &Track, fields: &[TrackDisplayField], sep: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let title = non_blank(Some(track.title.as_str()));

    for f in fields {
        let part = match f {
            TrackDisplayField::Display => {
                let joined: Vec<&str> = [non_blank(track.artist.as_deref()), title]
                    .into_iter()
                    .flatten()
                    .collect();
                (!joined.is_empty()).then(|| joined.join(sep))
            }
            TrackDisplayField::Title => title.map(str::to_string),
            TrackDisplayField::Artist => non_blank(track.artist.as_deref()).map(str::to_string),
            TrackDisplayField::Album => non_blank(track.album.as_deref()).map(str::to_string),
            TrackDisplayField::Genre => non_blank(track.meta.genre.as_deref()).map(str::to_string),
            TrackDisplayField::Filename => non_blank(
                track.source_url.file_stem().and_then(|s| s.to_str()),
            )
            .map(str::to_string),
            TrackDisplayField::Path => Some(track.source_url.display().to_string()),
        };
        if let Some(p) = part {
            parts.push(p);
        }
    }

    if parts.is_empty() {
        track.title.clone()
    } else {
        parts.join(sep)
    }
}
