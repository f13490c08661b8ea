use ndarray::Array2;

use super::spectrum::{stft, StftParams};
use crate::error::{BeatMapError, Result};

/// Hz to mel on the Slaney scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;
    if hz < min_log_hz {
        hz / f_sp
    } else {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;
    if mel < min_log_mel {
        mel * f_sp
    } else {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    }
}

/// `n` frequencies evenly spaced on the mel scale between `fmin` and `fmax`.
fn mel_points(n: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    let lo = hz_to_mel(fmin);
    let hi = hz_to_mel(fmax);
    let step = (hi - lo) / (n as f32 - 1.0).max(1.0);
    (0..n).map(|i| mel_to_hz(lo + step * i as f32)).collect()
}

/// Triangular, area-normalized mel filterbank of shape `(n_mels, n_fft / 2 + 1)`.
///
/// Fails when the band is inverted, exceeds Nyquist, or is split so finely
/// that some filter covers no FFT bin at all.
pub fn mel_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Result<Array2<f32>> {
    if n_mels == 0 {
        return Err(BeatMapError::config("mel.n_mels", "must be at least 1"));
    }
    if !(fmin >= 0.0 && fmin < fmax) {
        return Err(BeatMapError::config(
            "mel.fmin",
            format!("fmin ({fmin} Hz) must be non-negative and below fmax ({fmax} Hz)"),
        ));
    }
    let nyquist = sample_rate as f32 / 2.0;
    if fmax > nyquist {
        return Err(BeatMapError::config(
            "mel.fmax",
            format!("fmax ({fmax} Hz) exceeds the Nyquist frequency ({nyquist} Hz)"),
        ));
    }

    let n_freq = n_fft / 2 + 1;
    let bin_hz = sample_rate as f32 / n_fft as f32;
    let points = mel_points(n_mels + 2, fmin, fmax);

    let mut fb = Array2::<f32>::zeros((n_mels, n_freq));
    for m in 0..n_mels {
        let (left, center, right) = (points[m], points[m + 1], points[m + 2]);
        let rise = (center - left).max(1e-8);
        let fall = (right - center).max(1e-8);
        let enorm = 2.0 / (right - left).max(1e-8);

        for k in 0..n_freq {
            let freq = k as f32 * bin_hz;
            let w = ((freq - left) / rise).min((right - freq) / fall).max(0.0);
            fb[(m, k)] = w * enorm;
        }

        if fb.row(m).iter().all(|&w| w == 0.0) {
            return Err(BeatMapError::config(
                "mel.n_mels",
                format!(
                    "{n_mels} bands over {fmin}-{fmax} Hz leaves band {m} \
                     ({left:.1}-{right:.1} Hz) without any FFT bin; use fewer bands or a wider range"
                ),
            ));
        }
    }

    Ok(fb)
}

/// Mel power spectrogram `(n_mels, n_frames)` of `samples` through `filterbank`.
pub fn melspectrogram(samples: &[f32], params: StftParams, filterbank: &Array2<f32>) -> Array2<f32> {
    let spec = stft(samples, params);
    let power = spec.mapv(|c| c.norm_sqr());
    filterbank.dot(&power)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [20.0, 440.0, 999.0, 1000.0, 4000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, max_relative = 1e-4);
        }
    }

    #[test]
    fn default_band_has_no_empty_filters() {
        let fb = mel_filterbank(22050, 2048, 32, 20.0, 500.0).unwrap();
        assert_eq!(fb.dim(), (32, 1025));
        // nothing above fmax leaks in
        let cutoff = (500.0 / (22050.0 / 2048.0)) as usize + 1;
        for m in 0..32 {
            assert!(fb.row(m).iter().skip(cutoff + 1).all(|&w| w == 0.0));
        }
    }

    #[test]
    fn too_many_bands_is_rejected() {
        let err = mel_filterbank(22050, 2048, 128, 20.0, 100.0).unwrap_err();
        assert!(matches!(err, BeatMapError::Configuration { field: "mel.n_mels", .. }));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let err = mel_filterbank(22050, 2048, 32, 500.0, 500.0).unwrap_err();
        assert!(matches!(err, BeatMapError::Configuration { field: "mel.fmin", .. }));
    }

    #[test]
    fn band_above_nyquist_is_rejected() {
        let err = mel_filterbank(8000, 2048, 32, 20.0, 5000.0).unwrap_err();
        assert!(matches!(err, BeatMapError::Configuration { field: "mel.fmax", .. }));
    }

    #[test]
    fn low_tone_excites_low_bands_only() {
        let sr = 22050;
        let params = StftParams {
            n_fft: 2048,
            hop_length: 512,
        };
        let fb = mel_filterbank(sr, 2048, 16, 20.0, 500.0).unwrap();
        let y: Vec<f32> = (0..sr as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 60.0 * i as f32 / sr as f32).sin())
            .collect();
        let s = melspectrogram(&y, params, &fb);
        assert_eq!(s.nrows(), 16);
        let mid = s.ncols() / 2;
        let lowest = (0..4).map(|m| s[(m, mid)]).fold(0.0f32, f32::max);
        let highest = s[(15, mid)];
        assert!(lowest > 100.0 * highest);
    }
}
