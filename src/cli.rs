use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "beatmap", about = "Extract onset timestamps from a music track as video-cut sync points")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Output JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (defaults to ./beatmap.toml or ~/.config/beatmap/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also copy the beat map into this directory
    #[arg(long)]
    pub publish_dir: Option<PathBuf>,

    /// Minimum seconds between beats
    #[arg(long)]
    pub min_interval: Option<f32>,

    /// Analysis sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Samples between analysis frames
    #[arg(long)]
    pub hop_length: Option<usize>,

    /// Lower edge of the onset band in Hz
    #[arg(long)]
    pub fmin: Option<f32>,

    /// Upper edge of the onset band in Hz
    #[arg(long)]
    pub fmax: Option<f32>,

    /// Number of mel bands in the onset band
    #[arg(long)]
    pub n_mels: Option<usize>,

    /// Threshold above the local mean a peak must clear
    #[arg(long)]
    pub delta: Option<f32>,

    /// Analyze and print the beat map without writing files
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Flags given on the command line win over config file values.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(ref input) = self.input {
            cfg.io.input = Some(input.clone());
        }
        if let Some(ref output) = self.output {
            cfg.io.output = output.clone();
        }
        if let Some(ref dir) = self.publish_dir {
            cfg.io.publish_dir = Some(dir.clone());
        }
        if let Some(v) = self.min_interval { cfg.analysis.min_beat_interval = v; }
        if let Some(v) = self.sample_rate { cfg.analysis.sample_rate = v; }
        if let Some(v) = self.hop_length { cfg.analysis.hop_length = v; }
        if let Some(v) = self.fmin { cfg.mel.fmin = v; }
        if let Some(v) = self.fmax { cfg.mel.fmax = v; }
        if let Some(v) = self.n_mels { cfg.mel.n_mels = v; }
        if let Some(v) = self.delta { cfg.peaks.delta = v; }
    }
}
