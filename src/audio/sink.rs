//! `rodio` implementation of the output backend.
//!
//! One `OutputStream` per session; every loaded source gets its own paused
//! `Sink` connected to the stream's mixer.

use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::backend::{AudioBackend, BoxedSource, Transport};
use super::error::BackendError;

pub struct RodioBackend {
    stream: OutputStream,
}

impl RodioBackend {
    /// Open the default output device.
    pub fn open_default() -> Result<Self, BackendError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| BackendError::Open(e.to_string()))?;
        // rodio logs to stderr when the stream is dropped, which would land on
        // top of the TUI.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, source: BoxedSource) -> Result<Box<dyn Transport>, BackendError> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(source);
        Ok(Box::new(SinkTransport { sink }))
    }
}

struct SinkTransport {
    sink: Sink,
}

impl Transport for SinkTransport {
    fn play(&mut self) -> Result<(), BackendError> {
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn seek(&mut self, position: Duration) -> Result<(), BackendError> {
        self.sink
            .try_seek(position)
            .map_err(|e| BackendError::Seek(e.to_string()))
    }

    fn position(&self) -> Duration {
        self.sink.get_pos()
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
