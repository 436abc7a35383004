/// One drawn column of a waveform.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct PeakColumn {
    /// Largest absolute sample in the column.
    pub peak: f32,
    /// Root mean square of the column.
    pub rms: f32,
}

/// Folds a stream of mono frames into fixed-width columns.
#[derive(Debug)]
pub struct PeakAccumulator {
    frames_per_column: usize,
    count: usize,
    peak: f32,
    sum_sq: f64,
}

impl PeakAccumulator {
    pub fn new(frames_per_column: usize) -> Self {
        Self {
            frames_per_column: frames_per_column.max(1),
            count: 0,
            peak: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Add one frame; returns a column each time one fills up.
    pub fn push(&mut self, sample: f32) -> Option<PeakColumn> {
        let sample = if sample.is_finite() { sample } else { 0.0 };
        self.peak = self.peak.max(sample.abs());
        self.sum_sq += (sample as f64) * (sample as f64);
        self.count += 1;
        (self.count >= self.frames_per_column).then(|| self.take())
    }

    /// The partially filled column, if any frames are buffered.
    pub fn finish(&mut self) -> Option<PeakColumn> {
        (self.count > 0).then(|| self.take())
    }

    fn take(&mut self) -> PeakColumn {
        let column = PeakColumn {
            peak: self.peak.min(1.0),
            rms: ((self.sum_sq / self.count as f64).sqrt() as f32).min(1.0),
        };
        self.count = 0;
        self.peak = 0.0;
        self.sum_sq = 0.0;
        column
    }
}

/// Resample `columns` to exactly `target` columns, merging or stretching.
pub fn fit_columns(columns: &[PeakColumn], target: usize) -> Vec<PeakColumn> {
    if columns.len() == target || columns.is_empty() || target == 0 {
        return columns.iter().copied().take(target).collect();
    }
    let len = columns.len();
    (0..target)
        .map(|j| {
            let start = (j * len / target).min(len - 1);
            let end = ((j + 1) * len / target).clamp(start + 1, len);
            let group = &columns[start..end];
            let peak = group.iter().map(|c| c.peak).fold(0.0f32, f32::max);
            let mean_sq = group.iter().map(|c| c.rms * c.rms).sum::<f32>() / group.len() as f32;
            PeakColumn {
                peak,
                rms: mean_sq.sqrt(),
            }
        })
        .collect()
}
