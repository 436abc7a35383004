//! Frequency-domain view of whatever the owned output is playing.

use std::f32::consts::PI;
use std::sync::{Arc, Weak};

use log::debug;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::AnalyzerSettings;

use super::error::GraphAttachError;
use super::output::OutputHandle;
use super::tap::{TapBus, TAP_WINDOW};

pub struct AudioGraphAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    window: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    bins: Vec<f32>,
    tap: Option<Weak<TapBus>>,
}

impl AudioGraphAnalyzer {
    pub fn new(settings: &AnalyzerSettings) -> Self {
        let fft_size = settings.fft_size.clamp(32, TAP_WINDOW).next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let bin_count = fft_size / 2;

        Self {
            fft,
            fft_size,
            smoothing: settings.smoothing.clamp(0.0, 0.99),
            min_db: settings.min_db,
            max_db: settings.max_db,
            window: blackman(fft_size),
            samples: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            smoothed: vec![0.0; bin_count],
            bins: vec![0.0; bin_count],
            tap: None,
        }
    }

    /// Wire the analysis tap into `output`'s graph.
    ///
    /// An output can be observed by one analyzer for its whole lifetime.
    pub fn attach(&mut self, output: &OutputHandle) -> Result<(), GraphAttachError> {
        if output.is_released() {
            return Err(GraphAttachError::NoOutput);
        }
        if let Some(current) = self.live_tap() {
            return Err(GraphAttachError::AlreadyAttached(current.owner()));
        }
        let tap = output.tap();
        let Some(bus) = tap.upgrade() else {
            return Err(GraphAttachError::NoOutput);
        };
        if !bus.claim_attachment() {
            return Err(GraphAttachError::AlreadyAttached(bus.owner()));
        }
        debug!("analyzer attached to output {}", bus.owner());
        self.tap = Some(tap);
        Ok(())
    }

    /// True while attached to an output that has not been released.
    pub fn is_attached(&self) -> bool {
        self.live_tap().is_some()
    }

    /// Forget the tap. The output itself still cannot be attached again.
    pub fn detach(&mut self) {
        self.tap = None;
        self.smoothed.fill(0.0);
        self.bins.fill(0.0);
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn live_tap(&self) -> Option<Arc<TapBus>> {
        self.tap
            .as_ref()
            .and_then(Weak::upgrade)
            .filter(|bus| !bus.is_closed())
    }

    /// Latest normalized magnitudes in `[0, 1]`, one per bin. Never blocks on
    /// the audio thread.
    pub fn read(&mut self) -> &[f32] {
        let Some(bus) = self.live_tap() else {
            self.smoothed.fill(0.0);
            self.bins.fill(0.0);
            return &self.bins;
        };
        if bus.is_suspended() {
            bus.resume();
            self.bins.fill(0.0);
            return &self.bins;
        }

        bus.snapshot(&mut self.samples);
        for ((dst, s), w) in self.buffer.iter_mut().zip(&self.samples).zip(&self.window) {
            *dst = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f32;
        let range = (self.max_db - self.min_db).max(f32::EPSILON);
        for ((bin, smoothed), c) in self
            .bins
            .iter_mut()
            .zip(self.smoothed.iter_mut())
            .zip(&self.buffer)
        {
            let magnitude = c.norm() * scale;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            *bin = ((db - self.min_db) / range).clamp(0.0, 1.0);
        }
        &self.bins
    }
}

fn blackman(n: usize) -> Vec<f32> {
    let denom = (n.max(2) - 1) as f32;
    (0..n)
        .map(|i| {
            let x = i as f32 / denom;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ExclusivitySweeper;
    use rodio::Source;
    use rodio::source::SineWave;

    fn settings() -> AnalyzerSettings {
        AnalyzerSettings {
            fft_size: 1024,
            smoothing: 0.0,
            ..AnalyzerSettings::default()
        }
    }

    #[test]
    fn bins_are_half_the_fft_size() {
        let analyzer = AudioGraphAnalyzer::new(&AnalyzerSettings::default());
        assert_eq!(analyzer.bin_count(), 512);

        let odd = AudioGraphAnalyzer::new(&AnalyzerSettings {
            fft_size: 1000,
            ..AnalyzerSettings::default()
        });
        assert_eq!(odd.fft_size(), 1024);
    }

    #[test]
    fn first_read_resumes_the_tap_and_returns_silence() {
        let sweeper = ExclusivitySweeper::new();
        let output = OutputHandle::new(&sweeper, 1.0);
        let mut analyzer = AudioGraphAnalyzer::new(&settings());
        analyzer.attach(&output).unwrap();

        assert!(analyzer.read().iter().all(|b| *b == 0.0));
        assert!(!output.tap().upgrade().unwrap().is_suspended());
    }

    #[test]
    fn sine_peaks_at_its_frequency_bin() {
        let sweeper = ExclusivitySweeper::new();
        let output = OutputHandle::new(&sweeper, 1.0);
        let mut analyzer = AudioGraphAnalyzer::new(&settings());
        analyzer.attach(&output).unwrap();
        analyzer.read();

        let sine = SineWave::new(1000.0);
        let rate = u32::from(sine.sample_rate()) as f32;
        let mut tap = output.tap_source(sine);
        for _ in 0..4096 {
            tap.next();
        }
        let expected = (1000.0 * 1024.0 / rate).round() as usize;

        let bins = analyzer.read();
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak.abs_diff(expected) <= 1, "peak {peak}, expected {expected}");
        assert!(bins[peak] > 0.5);
        assert!(bins.iter().all(|b| (0.0..=1.0).contains(b)));
    }

    #[test]
    fn second_attach_is_rejected() {
        let sweeper = ExclusivitySweeper::new();
        let output = OutputHandle::new(&sweeper, 1.0);
        let mut first = AudioGraphAnalyzer::new(&settings());
        let mut second = AudioGraphAnalyzer::new(&settings());

        first.attach(&output).unwrap();
        assert_eq!(
            first.attach(&output),
            Err(GraphAttachError::AlreadyAttached(output.id()))
        );
        assert_eq!(
            second.attach(&output),
            Err(GraphAttachError::AlreadyAttached(output.id()))
        );

        first.detach();
        assert!(first.attach(&output).is_err());
    }

    #[test]
    fn attached_analyzer_names_its_own_output_when_asked_for_another() {
        let sweeper = ExclusivitySweeper::new();
        let watched = OutputHandle::new(&sweeper, 1.0);
        let other = OutputHandle::new(&sweeper, 1.0);
        let mut analyzer = AudioGraphAnalyzer::new(&settings());
        analyzer.attach(&watched).unwrap();

        assert_eq!(
            analyzer.attach(&other),
            Err(GraphAttachError::AlreadyAttached(watched.id()))
        );
        // The refused output is still free for another analyzer.
        let mut second = AudioGraphAnalyzer::new(&settings());
        assert_eq!(second.attach(&other), Ok(()));
    }

    #[test]
    fn released_output_cannot_be_attached() {
        let sweeper = ExclusivitySweeper::new();
        let output = OutputHandle::new(&sweeper, 1.0);
        output.release();
        let mut analyzer = AudioGraphAnalyzer::new(&settings());
        assert_eq!(analyzer.attach(&output), Err(GraphAttachError::NoOutput));
    }

    #[test]
    fn dropping_the_output_leaves_a_dead_tap() {
        let sweeper = ExclusivitySweeper::new();
        let output = OutputHandle::new(&sweeper, 1.0);
        let mut analyzer = AudioGraphAnalyzer::new(&settings());
        analyzer.attach(&output).unwrap();
        drop(output);

        assert!(!analyzer.is_attached());
        assert!(analyzer.read().iter().all(|b| *b == 0.0));
    }
}
