use std::path::{Path, PathBuf};

use crate::error::{BeatMapError, Result};

/// Seconds for frame `frame`, rounded to milliseconds.
pub fn frame_to_time(frame: usize, hop_length: usize, sample_rate: u32) -> f64 {
    let seconds = frame as f64 * hop_length as f64 / sample_rate as f64;
    (seconds * 1000.0).round() / 1000.0
}

pub fn frames_to_timestamps(frames: &[usize], hop_length: usize, sample_rate: u32) -> Vec<f64> {
    frames
        .iter()
        .map(|&f| frame_to_time(f, hop_length, sample_rate))
        .collect()
}

/// Spacing between consecutive timestamps, for the run summary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl IntervalStats {
    /// `None` with fewer than two timestamps.
    pub fn from_timestamps(timestamps: &[f64]) -> Option<Self> {
        if timestamps.len() < 2 {
            return None;
        }
        let gaps: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
        let min = gaps.iter().copied().fold(f64::INFINITY, f64::min);
        let max = gaps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        Some(Self { min, max, mean })
    }
}

/// Pretty-printed JSON array of timestamps.
pub fn to_json(timestamps: &[f64]) -> String {
    // Vec<f64> always serializes
    serde_json::to_string_pretty(timestamps).unwrap_or_else(|_| "[]".into())
}

/// Write the beat map to `path`, replacing any existing file.
pub fn write_beat_map(path: &Path, timestamps: &[f64]) -> Result<()> {
    let mut json = to_json(timestamps);
    json.push('\n');
    std::fs::write(path, json).map_err(|source| BeatMapError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Copy a written beat map into `dir`, keeping its file name.
pub fn publish(output: &Path, dir: &Path) -> Result<PathBuf> {
    let name = output
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("beat_map.json"));
    let target = dir.join(name);
    std::fs::create_dir_all(dir)
        .and_then(|_| std::fs::copy(output, &target))
        .map_err(|source| BeatMapError::Write {
            path: target.clone(),
            source,
        })?;
    Ok(target)
}
