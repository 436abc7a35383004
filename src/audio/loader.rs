//! Asynchronous source preparation.
//!
//! A load is identified by a ticket; the service only accepts the outcome
//! whose ticket matches the load it is currently waiting for.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use lofty::prelude::AudioFile;
use rodio::{Decoder, Source};

use crate::library::Track;

use super::backend::PreparedSource;

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub ticket: u64,
    pub track: Track,
}

pub struct LoadOutcome {
    pub ticket: u64,
    pub result: Result<PreparedSource, String>,
}

/// Turns a track descriptor into a playable source, off the caller's thread.
pub trait SourceLoader {
    /// Start preparing `request`. Exactly one outcome must be sent on `reply`,
    /// unless the receiver is gone.
    fn load(&self, request: LoadRequest, reply: Sender<LoadOutcome>);
}

/// Decodes with `rodio` on a short-lived worker thread per request.
#[derive(Debug, Default)]
pub struct ThreadLoader;

impl SourceLoader for ThreadLoader {
    fn load(&self, request: LoadRequest, reply: Sender<LoadOutcome>) {
        let ticket = request.ticket;
        let fallback = reply.clone();
        let spawned = thread::Builder::new()
            .name(format!("soundstage-load-{ticket}"))
            .spawn(move || {
                let result = open_source(&request.track.source_url);
                if let Err(e) = &result {
                    debug!("load {ticket} of {} failed: {e}", request.track.id);
                }
                // The service may have been dropped meanwhile.
                let _ = reply.send(LoadOutcome { ticket, result });
            });

        if let Err(e) = spawned {
            warn!("could not spawn loader thread: {e}");
            let _ = fallback.send(LoadOutcome {
                ticket,
                result: Err(format!("could not spawn loader: {e}")),
            });
        }
    }
}

/// Open and decode `path`, learning its duration from the decoder or, failing
/// that, from the container's properties.
pub fn open_source(path: &Path) -> Result<PreparedSource, String> {
    let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;
    let duration = decoder.total_duration().or_else(|| probe_duration(path));
    Ok(PreparedSource::new(Box::new(decoder), duration))
}

fn probe_duration(path: &Path) -> Option<Duration> {
    let tagged = lofty::read_from_path(path).ok()?;
    let duration = tagged.properties().duration();
    (!duration.is_zero()).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn missing_file_reports_an_error_with_the_same_ticket() {
        let (tx, rx) = mpsc::channel();
        let track = Track::new("nope", "nope", "/definitely/not/here.flac");
        ThreadLoader.load(LoadRequest { ticket: 7, track }, tx);

        let outcome = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("loader replied");
        assert_eq!(outcome.ticket, 7);
        let err = outcome.result.err().expect("load should fail");
        assert!(err.contains("here.flac"));
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(open_source(&path).is_err());
    }
}
