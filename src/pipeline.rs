use std::path::PathBuf;

use crate::audio::decode::{load_audio, AudioData};
use crate::audio::hpss;
use crate::audio::onset::onset_strength;
use crate::config::Config;
use crate::error::{BeatMapError, Result};
use crate::export::{self, IntervalStats};

/// Result of one analysis run.
#[derive(Clone, Debug)]
pub struct BeatMap {
    /// Accepted onset frames, strictly increasing.
    pub frames: Vec<usize>,
    /// Seconds, rounded to milliseconds, one per frame.
    pub timestamps: Vec<f64>,
    pub stats: Option<IntervalStats>,
    pub duration: f32,
}

/// Decode `config.io.input`, analyze it and write the beat map.
///
/// With `dry_run` the map is computed but nothing is written.
pub fn run(config: &Config, dry_run: bool) -> Result<BeatMap> {
    config.validate()?;
    let input = config
        .io
        .input
        .as_ref()
        .ok_or_else(|| BeatMapError::config("io.input", "no input audio file given"))?;

    log::info!("Loading audio: {}", input.display());
    let audio = load_audio(input, config.analysis.sample_rate)?;
    log::info!("Duration: {:.2} seconds", audio.duration());

    let beat_map = analyze(&audio, config)?;

    if dry_run {
        log::info!("Dry run, not writing {}", config.io.output.display());
        return Ok(beat_map);
    }

    log::info!("Writing {}", config.io.output.display());
    export::write_beat_map(&config.io.output, &beat_map.timestamps)?;

    match config.io.publish_dir {
        Some(ref dir) => {
            let target = export::publish(&config.io.output, dir)?;
            log::info!("Published to {}", target.display());
        }
        None => log::info!(
            "Copy {} into the web app's public/ directory (or pass --publish-dir)",
            config.io.output.display()
        ),
    }

    Ok(beat_map)
}

/// Separation, onset strength and peak picking over an in-memory buffer.
pub fn analyze(audio: &AudioData, config: &Config) -> Result<BeatMap> {
    config.validate()?;
    if audio.samples.is_empty() {
        return Err(BeatMapError::decode(PathBuf::from("<buffer>"), "signal has no samples"));
    }
    if audio.sample_rate != config.analysis.sample_rate {
        return Err(BeatMapError::config(
            "analysis.sample_rate",
            format!(
                "audio is {}Hz but analysis expects {}Hz",
                audio.sample_rate, config.analysis.sample_rate
            ),
        ));
    }

    log::info!("Separating percussive component...");
    let separation = hpss::separate(&audio.samples, &config.hpss_params());
    log::debug!(
        "Energy split: harmonic {:.3}, percussive {:.3}",
        energy(&separation.harmonic),
        energy(&separation.percussive)
    );

    log::info!(
        "Computing onset strength ({:.0}-{:.0} Hz, {} mel bands)...",
        config.mel.fmin,
        config.mel.fmax,
        config.mel.n_mels
    );
    let envelope = onset_strength(&separation.percussive, &config.onset_params())?;

    let picker = config.peak_picker();
    log::info!(
        "Detecting peaks (min interval: {}s = {} frames)...",
        config.analysis.min_beat_interval,
        picker.wait
    );
    let frames = picker.pick(&envelope);

    let timestamps =
        export::frames_to_timestamps(&frames, config.analysis.hop_length, audio.sample_rate);
    let stats = IntervalStats::from_timestamps(&timestamps);

    log::info!("Detected {} beat markers", timestamps.len());
    if timestamps.is_empty() {
        log::warn!("No onsets passed the peak picker; try lowering peaks.delta");
    }

    Ok(BeatMap {
        frames,
        timestamps,
        stats,
        duration: audio.duration(),
    })
}

fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| (s as f64) * (s as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22050;

    /// Decaying 60 Hz kicks every `period` seconds under a steady 1 kHz tone.
    fn kicks_over_tone(seconds: f32, period: f32) -> AudioData {
        let n = (seconds * SR as f32) as usize;
        let step = (period * SR as f32) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / SR as f32;
                let tone = 0.2 * (2.0 * std::f32::consts::PI * 1000.0 * t).sin();
                let since = (i % step) as f32 / SR as f32;
                let kick = (2.0 * std::f32::consts::PI * 60.0 * since).sin() * (-since * 30.0).exp();
                tone + 0.8 * kick
            })
            .collect();
        AudioData {
            samples,
            sample_rate: SR,
        }
    }

    fn fast_config() -> Config {
        let mut cfg = Config::default();
        cfg.separation.harmonic_kernel = 9;
        cfg.separation.percussive_kernel = 9;
        cfg
    }

    #[test]
    fn finds_spaced_kicks() {
        let audio = kicks_over_tone(4.0, 1.0);
        let map = analyze(&audio, &fast_config()).unwrap();
        let wait = fast_config().wait_frames();

        assert!(!map.frames.is_empty());
        for pair in map.frames.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!(pair[1] - pair[0] >= wait);
        }
        for (&f, &t) in map.frames.iter().zip(map.timestamps.iter()) {
            assert!(t >= 0.0);
            assert_eq!(t, export::frame_to_time(f, 512, SR));
        }
        // every detection sits near a kick
        for &t in &map.timestamps {
            let offset = t - t.round();
            assert!(offset.abs() < 0.1, "onset at {t}s is not near a kick");
        }
    }

    #[test]
    fn silence_yields_no_beats() {
        let audio = AudioData {
            samples: vec![0.0; SR as usize * 2],
            sample_rate: SR,
        };
        let map = analyze(&audio, &fast_config()).unwrap();
        assert!(map.frames.is_empty());
        assert_eq!(export::to_json(&map.timestamps), "[]");
        assert!(map.stats.is_none());
    }

    #[test]
    fn silence_yields_no_beats_with_zero_delta() {
        let audio = AudioData {
            samples: vec![0.0; SR as usize * 2],
            sample_rate: SR,
        };
        let mut cfg = fast_config();
        cfg.peaks.delta = 0.0;
        cfg.validate().unwrap();

        let map = analyze(&audio, &cfg).unwrap();
        assert!(map.frames.is_empty());
        assert_eq!(export::to_json(&map.timestamps), "[]");
    }

    #[test]
    fn huge_delta_yields_no_beats() {
        let audio = kicks_over_tone(3.0, 1.0);
        let mut cfg = fast_config();
        cfg.peaks.delta = 1.0e6;
        assert!(analyze(&audio, &cfg).unwrap().frames.is_empty());
    }

    #[test]
    fn analysis_is_deterministic() {
        let audio = kicks_over_tone(3.0, 0.75);
        let a = analyze(&audio, &fast_config()).unwrap();
        let b = analyze(&audio, &fast_config()).unwrap();
        assert_eq!(a.frames, b.frames);
        assert_eq!(export::to_json(&a.timestamps), export::to_json(&b.timestamps));
    }

    #[test]
    fn empty_signal_is_decode_error() {
        let audio = AudioData {
            samples: Vec::new(),
            sample_rate: SR,
        };
        let err = analyze(&audio, &fast_config()).unwrap_err();
        assert!(matches!(err, BeatMapError::Decode { .. }));
    }

    #[test]
    fn inverted_band_aborts_before_analysis() {
        let mut cfg = fast_config();
        cfg.mel.fmin = 500.0;
        cfg.mel.fmax = 20.0;
        let err = analyze(&kicks_over_tone(1.0, 0.5), &cfg).unwrap_err();
        assert!(matches!(err, BeatMapError::Configuration { .. }));
    }

    #[test]
    fn run_writes_identical_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.wav");
        let audio = kicks_over_tone(3.0, 1.0);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SR,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for &s in &audio.samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let mut cfg = fast_config();
        cfg.io.input = Some(input);
        cfg.io.output = dir.path().join("first.json");
        cfg.io.publish_dir = Some(dir.path().join("public"));
        let map = run(&cfg, false).unwrap();
        let first = std::fs::read_to_string(&cfg.io.output).unwrap();

        cfg.io.output = dir.path().join("second.json");
        cfg.io.publish_dir = None;
        run(&cfg, false).unwrap();
        let second = std::fs::read_to_string(&cfg.io.output).unwrap();

        assert_eq!(first, second);
        let parsed: Vec<f64> = serde_json::from_str(&first).unwrap();
        assert_eq!(parsed, map.timestamps);
        assert!(dir.path().join("public").join("first.json").exists());
    }

    #[test]
    fn failed_decode_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = fast_config();
        cfg.io.input = Some(dir.path().join("missing.mp3"));
        cfg.io.output = dir.path().join("beat_map.json");
        assert!(matches!(run(&cfg, false), Err(BeatMapError::Decode { .. })));
        assert!(!cfg.io.output.exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SR,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for s in kicks_over_tone(1.0, 0.5).samples {
            writer.write_sample((s * 16000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut cfg = fast_config();
        cfg.io.input = Some(input);
        cfg.io.output = dir.path().join("beat_map.json");
        run(&cfg, true).unwrap();
        assert!(!cfg.io.output.exists());
    }
}
