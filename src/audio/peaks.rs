/// Constrained local-maximum picker over an onset-strength envelope.
///
/// Window radii are in frames; windows are clipped at the envelope borders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeakPicker {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    /// Required excess over the local mean.
    pub delta: f32,
    /// Minimum distance in frames from the previously accepted peak.
    pub wait: usize,
}

impl PeakPicker {
    /// Frame indices of accepted peaks, strictly increasing.
    pub fn pick(&self, envelope: &[f32]) -> Vec<usize> {
        let n = envelope.len();
        let mut peaks = Vec::new();
        let mut last: Option<usize> = None;

        for (t, &value) in envelope.iter().enumerate() {
            // a flat zero stretch is its own local max and mean; never an onset
            if value <= 0.0 {
                continue;
            }

            let max_lo = t.saturating_sub(self.pre_max);
            let max_hi = (t + self.post_max + 1).min(n);
            let local_max = envelope[max_lo..max_hi]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            if value < local_max {
                continue;
            }

            let avg_lo = t.saturating_sub(self.pre_avg);
            let avg_hi = (t + self.post_avg + 1).min(n);
            let window = &envelope[avg_lo..avg_hi];
            let local_mean = window.iter().sum::<f32>() / window.len() as f32;
            if value < local_mean + self.delta {
                continue;
            }

            if let Some(prev) = last {
                if t - prev < self.wait {
                    continue;
                }
            }

            peaks.push(t);
            last = Some(t);
        }

        peaks
    }
}

/// Minimum peak spacing in frames for a minimum interval in seconds.
pub fn wait_frames(min_interval: f32, sample_rate: u32, hop_length: usize) -> usize {
    (min_interval as f64 * sample_rate as f64 / hop_length as f64).floor() as usize
}
