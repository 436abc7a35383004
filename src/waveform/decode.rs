//! Background decode of a file into peak columns.
//!
//! The worker owns no audible resource. It drives the widget's shadow
//! handle through start, progress and pause so the sweeper sees it like any
//! other voice, while the samples only ever reach the peak accumulator.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use rodio::Source;

use crate::audio::{ShadowHandle, open_source};

use super::peaks::{PeakAccumulator, PeakColumn, fit_columns};

/// Progress of one decode, shared between the worker and the widget.
#[derive(Debug, Clone, Default)]
pub struct WaveformData {
    pub columns: Vec<PeakColumn>,
    pub duration: Option<Duration>,
    /// Audio decoded so far.
    pub decoded: Duration,
    pub complete: bool,
    pub error: Option<String>,
}

pub type WaveformHandle = Arc<Mutex<WaveformData>>;

pub(crate) struct DecodeJob {
    pub path: PathBuf,
    pub columns: usize,
    pub chunk: usize,
    pub shadow: Arc<ShadowHandle>,
    pub data: WaveformHandle,
    pub cancel: Arc<AtomicBool>,
}

pub(crate) fn spawn(job: DecodeJob) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("soundstage-waveform".into())
        .spawn(move || run(job))
}

fn run(job: DecodeJob) {
    job.shadow.request_start();
    let result = decode(&job);
    job.shadow.request_pause();

    let mut data = job.data.lock().unwrap_or_else(|p| p.into_inner());
    data.complete = true;
    if let Err(e) = result {
        warn!("waveform for {} failed: {e}", job.path.display());
        data.error = Some(e);
    }
}

fn decode(job: &DecodeJob) -> Result<(), String> {
    let prepared = open_source(&job.path)?;
    let source = prepared.source;
    let channels = usize::from(u16::from(source.channels()).max(1));
    let rate = u32::from(source.sample_rate()).max(1);
    let target = job.columns.max(1);

    let known_frames = prepared
        .duration
        .map(|d| (d.as_secs_f64() * rate as f64).ceil() as usize);
    // Without a length, collect short columns and fit them at the end.
    let frames_per_column = match known_frames {
        Some(frames) => frames.div_ceil(target).max(1),
        None => (rate as usize / 20).max(1),
    };

    lock(&job.data).duration = prepared.duration;

    let mut acc = PeakAccumulator::new(frames_per_column);
    let mut columns: Vec<PeakColumn> = Vec::new();
    let mut published = 0usize;
    let mut frames = 0u64;
    let mut frame_sum = 0.0f32;
    let mut frame_fill = 0usize;

    for sample in source {
        frame_sum += sample;
        frame_fill += 1;
        if frame_fill < channels {
            continue;
        }
        let mono = frame_sum / channels as f32;
        frame_sum = 0.0;
        frame_fill = 0;
        frames += 1;

        let Some(column) = acc.push(mono) else {
            continue;
        };
        columns.push(column);
        if columns.len() - published >= job.chunk.max(1) {
            if job.cancel.load(Ordering::Acquire) {
                debug!("waveform decode of {} cancelled", job.path.display());
                return Ok(());
            }
            let decoded = Duration::from_secs_f64(frames as f64 / rate as f64);
            job.shadow.advance_to(decoded);
            if known_frames.is_some() {
                let mut data = lock(&job.data);
                data.columns.extend_from_slice(&columns[published..]);
                data.decoded = decoded;
                published = columns.len();
            }
        }
    }
    columns.extend(acc.finish());

    let decoded = Duration::from_secs_f64(frames as f64 / rate as f64);
    let mut data = lock(&job.data);
    data.columns = fit_columns(&columns, target);
    data.decoded = decoded;
    data.duration = data.duration.or(Some(decoded));
    Ok(())
}

fn lock(data: &WaveformHandle) -> std::sync::MutexGuard<'_, WaveformData> {
    data.lock().unwrap_or_else(|p| p.into_inner())
}
