use ndarray::Array2;

use super::mel::{mel_filterbank, melspectrogram};
use super::spectrum::{power_to_db, StftParams};
use crate::error::Result;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Band-limited onset-strength settings.
#[derive(Clone, Copy, Debug)]
pub struct OnsetParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
}

/// Onset-strength envelope of `samples`, one value per hop.
///
/// The mel spectrogram is restricted to `[fmin, fmax]`, converted to dB
/// against its own peak, and reduced to the mean positive flux across bands.
pub fn onset_strength(samples: &[f32], params: &OnsetParams) -> Result<Vec<f32>> {
    let filterbank = mel_filterbank(
        params.sample_rate,
        params.n_fft,
        params.n_mels,
        params.fmin,
        params.fmax,
    )?;

    let stft = StftParams {
        n_fft: params.n_fft,
        hop_length: params.hop_length,
    };
    let mel = melspectrogram(samples, stft, &filterbank);
    log::debug!(
        "Mel spectrogram: {} bands x {} frames ({:.0}-{:.0} Hz)",
        mel.nrows(),
        mel.ncols(),
        params.fmin,
        params.fmax
    );

    let db = power_to_db(&mel, AMIN, TOP_DB);
    Ok(mean_positive_flux(&db))
}

/// Mean over bands of the rectified frame-to-frame increase. Frame 0 is 0.
pub fn mean_positive_flux(spectrogram: &Array2<f32>) -> Vec<f32> {
    let (n_bands, n_frames) = spectrogram.dim();
    let mut envelope = vec![0.0f32; n_frames];
    if n_bands == 0 {
        return envelope;
    }

    for t in 1..n_frames {
        let rise: f32 = spectrogram
            .column(t)
            .iter()
            .zip(spectrogram.column(t - 1).iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        envelope[t] = rise / n_bands as f32;
    }

    envelope
}
