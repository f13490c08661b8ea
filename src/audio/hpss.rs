use ndarray::Array2;
use rustfft::num_complex::Complex;

use super::spectrum::{istft, stft, StftParams};

/// Median-filtering harmonic/percussive separation settings.
#[derive(Clone, Copy, Debug)]
pub struct HpssParams {
    pub stft: StftParams,
    /// Median length along time, in frames.
    pub harmonic_kernel: usize,
    /// Median length along frequency, in bins.
    pub percussive_kernel: usize,
    /// Exponent of the soft masks.
    pub power: f32,
}

/// Time-domain output of the separator. Both buffers match the input length.
#[derive(Clone, Debug)]
pub struct Separation {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

pub fn separate(samples: &[f32], params: &HpssParams) -> Separation {
    let spec = stft(samples, params.stft);
    let (n_freq, n_frames) = spec.dim();
    log::debug!(
        "HPSS: {} bins x {} frames, kernels h={} p={}",
        n_freq,
        n_frames,
        params.harmonic_kernel,
        params.percussive_kernel
    );

    let magnitude = spec.mapv(|c| c.norm());
    let harmonic_mag = median_along_time(&magnitude, params.harmonic_kernel);
    let percussive_mag = median_along_frequency(&magnitude, params.percussive_kernel);

    let (spec_h, spec_p) = apply_masks(&spec, &harmonic_mag, &percussive_mag, params.power);

    Separation {
        harmonic: istft(&spec_h, params.stft, samples.len()),
        percussive: istft(&spec_p, params.stft, samples.len()),
    }
}

/// Soft masks `H^p / (H^p + P^p)` and its complement. The two masks always sum
/// to one, so the component spectra add back up to the input spectrum.
fn apply_masks(
    spec: &Array2<Complex<f32>>,
    harmonic: &Array2<f32>,
    percussive: &Array2<f32>,
    power: f32,
) -> (Array2<Complex<f32>>, Array2<Complex<f32>>) {
    let mut spec_h = Array2::<Complex<f32>>::zeros(spec.raw_dim());
    let mut spec_p = Array2::<Complex<f32>>::zeros(spec.raw_dim());

    for ((idx, &bin), (&h, &p)) in spec
        .indexed_iter()
        .zip(harmonic.iter().zip(percussive.iter()))
    {
        let h = h.powf(power);
        let p = p.powf(power);
        let total = h + p;
        let mask_h = if total > f32::MIN_POSITIVE { h / total } else { 0.5 };
        spec_h[idx] = bin * mask_h;
        spec_p[idx] = bin * (1.0 - mask_h);
    }

    (spec_h, spec_p)
}

fn median_along_time(input: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let (n_freq, n_frames) = input.dim();
    let half = kernel / 2;
    let mut output = Array2::<f32>::zeros((n_freq, n_frames));
    let mut window = Vec::with_capacity(kernel);

    for f in 0..n_freq {
        for t in 0..n_frames {
            let start = t.saturating_sub(half);
            let end = (t + half + 1).min(n_frames);
            window.clear();
            window.extend((start..end).map(|j| input[(f, j)]));
            output[(f, t)] = median(&mut window);
        }
    }

    output
}

fn median_along_frequency(input: &Array2<f32>, kernel: usize) -> Array2<f32> {
    let (n_freq, n_frames) = input.dim();
    let half = kernel / 2;
    let mut output = Array2::<f32>::zeros((n_freq, n_frames));
    let mut window = Vec::with_capacity(kernel);

    for t in 0..n_frames {
        for f in 0..n_freq {
            let start = f.saturating_sub(half);
            let end = (f + half + 1).min(n_freq);
            window.clear();
            window.extend((start..end).map(|i| input[(i, t)]));
            output[(f, t)] = median(&mut window);
        }
    }

    output
}

/// Upper median of a window clipped at the matrix border.
fn median(window: &mut [f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let mid = window.len() / 2;
    let (_, m, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}
