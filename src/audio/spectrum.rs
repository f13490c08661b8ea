use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

/// Centered short-time Fourier transform settings shared by the
/// separator and the mel front end.
#[derive(Clone, Copy, Debug)]
pub struct StftParams {
    pub n_fft: usize,
    pub hop_length: usize,
}

impl StftParams {
    pub fn n_freq(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames produced for `len` samples with center padding.
    pub fn n_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }
}

/// Periodic Hann window, which satisfies the overlap-add condition at n_fft/4 hops.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Forward STFT. Frame `t` is centered on sample `t * hop_length`; the signal
/// is zero-padded by `n_fft / 2` on both sides.
///
/// Returns a `(n_fft / 2 + 1) x n_frames` complex matrix.
pub fn stft(samples: &[f32], params: StftParams) -> Array2<Complex<f32>> {
    let StftParams { n_fft, hop_length } = params;
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_freq = params.n_freq();
    let n_frames = params.n_frames(samples.len());
    let hann = hann_window(n_fft);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut matrix = Array2::<Complex<f32>>::zeros((n_freq, n_frames));
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    for frame in 0..n_frames {
        let start = frame * hop_length;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let s = padded.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * hann[i], 0.0);
        }
        fft.process(&mut buffer);
        for (f, &bin) in buffer[..n_freq].iter().enumerate() {
            matrix[(f, frame)] = bin;
        }
    }

    matrix
}

/// Inverse STFT by weighted overlap-add, trimmed back to `length` samples.
pub fn istft(matrix: &Array2<Complex<f32>>, params: StftParams, length: usize) -> Vec<f32> {
    let StftParams { n_fft, hop_length } = params;
    let (n_freq, n_frames) = matrix.dim();
    if n_frames == 0 || n_freq != params.n_freq() {
        return vec![0.0; length];
    }

    let hann = hann_window(n_fft);
    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let scale = 1.0 / n_fft as f32;

    let total = (n_frames - 1) * hop_length + n_fft;
    let mut out = vec![0.0f32; total];
    let mut norm = vec![0.0f32; total];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for frame in 0..n_frames {
        for f in 0..n_freq {
            buffer[f] = matrix[(f, frame)];
        }
        // Hermitian mirror so the inverse is real
        for f in 1..n_fft - n_freq + 1 {
            buffer[n_fft - f] = matrix[(f, frame)].conj();
        }
        ifft.process(&mut buffer);

        let start = frame * hop_length;
        for (i, bin) in buffer.iter().enumerate() {
            let w = hann[i];
            out[start + i] += bin.re * scale * w;
            norm[start + i] += w * w;
        }
    }

    let pad = n_fft / 2;
    (0..length)
        .map(|i| {
            let idx = i + pad;
            match (out.get(idx), norm.get(idx)) {
                (Some(&v), Some(&n)) if n > 1e-8 => v / n,
                _ => 0.0,
            }
        })
        .collect()
}

/// Power spectrogram to decibels relative to its own maximum, floored at
/// `top_db` below the peak. An all-silent input maps to all zeros.
pub fn power_to_db(power: &Array2<f32>, amin: f32, top_db: f32) -> Array2<f32> {
    let peak = power.iter().copied().fold(0.0f32, f32::max);
    let log_ref = 10.0 * peak.max(amin).log10();
    let db = power.mapv(|p| 10.0 * p.max(amin).log10() - log_ref);
    let max_db = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = max_db - top_db;
    db.mapv(|v| v.max(floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PARAMS: StftParams = StftParams {
        n_fft: 512,
        hop_length: 128,
    };

    fn chirp(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 8000.0;
                (2.0 * std::f32::consts::PI * (200.0 + 300.0 * t) * t).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn frame_count_follows_hop() {
        let m = stft(&vec![0.0; 1000], PARAMS);
        assert_eq!(m.dim(), (257, 1 + 1000 / 128));
    }

    #[test]
    fn round_trip_reconstructs_signal() {
        let signal = chirp(4000);
        let m = stft(&signal, PARAMS);
        let back = istft(&m, PARAMS, signal.len());
        assert_eq!(back.len(), signal.len());
        for (a, b) in signal.iter().zip(back.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-3);
        }
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann_window(8);
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-6);
        assert_relative_eq!(w[1], w[7], epsilon = 1e-6);
    }

    #[test]
    fn db_is_relative_to_peak() {
        let power = Array2::from_shape_vec((1, 3), vec![1.0, 0.1, 0.0]).unwrap();
        let db = power_to_db(&power, 1e-10, 80.0);
        assert_relative_eq!(db[(0, 0)], 0.0);
        assert_relative_eq!(db[(0, 1)], -10.0, epsilon = 1e-4);
        assert_relative_eq!(db[(0, 2)], -80.0, epsilon = 1e-4);
    }

    #[test]
    fn silent_db_is_flat() {
        let power = Array2::<f32>::zeros((2, 4));
        let db = power_to_db(&power, 1e-10, 80.0);
        assert!(db.iter().all(|&v| v == 0.0));
    }
}
