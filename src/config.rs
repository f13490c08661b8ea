use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::hpss::HpssParams;
use crate::audio::mel::mel_filterbank;
use crate::audio::onset::OnsetParams;
use crate::audio::peaks::{wait_frames, PeakPicker};
use crate::audio::spectrum::StftParams;
use crate::error::{BeatMapError, Result};

/// Everything one run needs. Built from defaults, an optional TOML file and
/// CLI overrides, then passed by reference into the pipeline.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub separation: SeparationConfig,
    #[serde(default)]
    pub mel: MelConfig,
    #[serde(default)]
    pub peaks: PeakConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct IoConfig {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Directory that receives a copy of the beat map (e.g. a web app's `public/`).
    #[serde(default)]
    pub publish_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    /// Seconds. Adjusted to 0.5s; earlier notes asked for 2-4s between cuts.
    #[serde(default = "default_min_beat_interval")]
    pub min_beat_interval: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SeparationConfig {
    #[serde(default = "default_kernel")]
    pub harmonic_kernel: usize,
    #[serde(default = "default_kernel")]
    pub percussive_kernel: usize,
    #[serde(default = "default_mask_power")]
    pub mask_power: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MelConfig {
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "default_fmin")]
    pub fmin: f32,
    #[serde(default = "default_fmax")]
    pub fmax: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PeakConfig {
    #[serde(default = "default_max_radius")]
    pub pre_max: usize,
    #[serde(default = "default_max_radius")]
    pub post_max: usize,
    #[serde(default = "default_avg_radius")]
    pub pre_avg: usize,
    #[serde(default = "default_avg_radius")]
    pub post_avg: usize,
    #[serde(default = "default_delta")]
    pub delta: f32,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: default_output(),
            publish_dir: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            hop_length: default_hop_length(),
            n_fft: default_n_fft(),
            min_beat_interval: default_min_beat_interval(),
        }
    }
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            harmonic_kernel: default_kernel(),
            percussive_kernel: default_kernel(),
            mask_power: default_mask_power(),
        }
    }
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_mels: default_n_mels(),
            fmin: default_fmin(),
            fmax: default_fmax(),
        }
    }
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            pre_max: default_max_radius(),
            post_max: default_max_radius(),
            pre_avg: default_avg_radius(),
            post_avg: default_avg_radius(),
            delta: default_delta(),
        }
    }
}

fn default_output() -> PathBuf { "beat_map.json".into() }
fn default_sample_rate() -> u32 { 22050 }
fn default_hop_length() -> usize { 512 }
fn default_n_fft() -> usize { 2048 }
fn default_min_beat_interval() -> f32 { 0.5 }
fn default_kernel() -> usize { 31 }
fn default_mask_power() -> f32 { 2.0 }
fn default_n_mels() -> usize { 32 }
fn default_fmin() -> f32 { 20.0 }
fn default_fmax() -> f32 { 500.0 }
fn default_max_radius() -> usize { 3 }
fn default_avg_radius() -> usize { 5 }
fn default_delta() -> f32 { 0.05 }

/// Parse a TOML config file. Unlike missing files, a file that exists but
/// does not parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BeatMapError::config("config", format!("cannot read {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        BeatMapError::config("config", format!("cannot parse {}: {}", path.display(), e))
    })
}

impl Config {
    /// Reject parameter combinations that cannot produce a meaningful analysis.
    /// Runs before any audio is touched.
    pub fn validate(&self) -> Result<()> {
        let a = &self.analysis;
        if a.sample_rate == 0 {
            return Err(BeatMapError::config("analysis.sample_rate", "must be positive"));
        }
        if a.hop_length == 0 {
            return Err(BeatMapError::config("analysis.hop_length", "must be positive"));
        }
        if a.n_fft < 2 || a.n_fft % 2 != 0 {
            return Err(BeatMapError::config(
                "analysis.n_fft",
                format!("must be an even number >= 2, got {}", a.n_fft),
            ));
        }
        if !(a.min_beat_interval.is_finite() && a.min_beat_interval >= 0.0) {
            return Err(BeatMapError::config(
                "analysis.min_beat_interval",
                format!("must be a non-negative number of seconds, got {}", a.min_beat_interval),
            ));
        }

        let s = &self.separation;
        if s.harmonic_kernel == 0 {
            return Err(BeatMapError::config("separation.harmonic_kernel", "must be at least 1"));
        }
        if s.percussive_kernel == 0 {
            return Err(BeatMapError::config("separation.percussive_kernel", "must be at least 1"));
        }
        if !(s.mask_power.is_finite() && s.mask_power > 0.0) {
            return Err(BeatMapError::config(
                "separation.mask_power",
                format!("must be positive, got {}", s.mask_power),
            ));
        }

        let m = &self.mel;
        if !(m.fmin.is_finite() && m.fmax.is_finite()) {
            return Err(BeatMapError::config("mel.fmin", "band edges must be finite"));
        }
        if m.fmin < 0.0 || m.fmin >= m.fmax {
            return Err(BeatMapError::config(
                "mel.fmin",
                format!("fmin ({} Hz) must be non-negative and below fmax ({} Hz)", m.fmin, m.fmax),
            ));
        }
        // Nyquist and empty-filter checks live with the filterbank itself
        mel_filterbank(a.sample_rate, a.n_fft, m.n_mels, m.fmin, m.fmax)?;

        if !(self.peaks.delta.is_finite() && self.peaks.delta >= 0.0) {
            return Err(BeatMapError::config(
                "peaks.delta",
                format!("must be non-negative, got {}", self.peaks.delta),
            ));
        }

        Ok(())
    }

    pub fn wait_frames(&self) -> usize {
        wait_frames(
            self.analysis.min_beat_interval,
            self.analysis.sample_rate,
            self.analysis.hop_length,
        )
    }

    pub fn peak_picker(&self) -> PeakPicker {
        PeakPicker {
            pre_max: self.peaks.pre_max,
            post_max: self.peaks.post_max,
            pre_avg: self.peaks.pre_avg,
            post_avg: self.peaks.post_avg,
            delta: self.peaks.delta,
            wait: self.wait_frames(),
        }
    }

    pub fn hpss_params(&self) -> HpssParams {
        HpssParams {
            stft: StftParams {
                n_fft: self.analysis.n_fft,
                hop_length: self.analysis.n_fft / 4,
            },
            harmonic_kernel: self.separation.harmonic_kernel,
            percussive_kernel: self.separation.percussive_kernel,
            power: self.separation.mask_power,
        }
    }

    pub fn onset_params(&self) -> OnsetParams {
        OnsetParams {
            sample_rate: self.analysis.sample_rate,
            n_fft: self.analysis.n_fft,
            hop_length: self.analysis.hop_length,
            n_mels: self.mel.n_mels,
            fmin: self.mel.fmin,
            fmax: self.mel.fmax,
        }
    }
}
