use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{BeatMapError, Result};

/// Mono samples at a known rate.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode `path`, downmix to mono and resample to `target_rate`.
pub fn load_audio(path: &Path, target_rate: u32) -> Result<AudioData> {
    let decoded = decode_audio(path)?;
    if decoded.samples.is_empty() {
        return Err(BeatMapError::decode(path, "no audio samples decoded"));
    }

    if decoded.sample_rate == target_rate {
        return Ok(decoded);
    }

    log::info!(
        "Resampling {}Hz -> {}Hz",
        decoded.sample_rate,
        target_rate
    );
    let samples = resample(&decoded.samples, decoded.sample_rate, target_rate)
        .map_err(|e| BeatMapError::Decode {
            path: path.to_path_buf(),
            reason: "resampling failed".into(),
            source: Some(e),
        })?;

    Ok(AudioData {
        samples,
        sample_rate: target_rate,
    })
}

/// Decode the first audio track of `path` at its native rate, downmixed to mono.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .map_err(|e| BeatMapError::decode_with(path, "failed to open audio file", e))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| BeatMapError::decode_with(path, "unsupported or malformed container", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| BeatMapError::decode(path, "no audio tracks found"))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| BeatMapError::decode(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BeatMapError::decode_with(path, "unsupported codec", e))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(BeatMapError::decode_with(path, "failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet: {}", msg);
                continue;
            }
            Err(e) => return Err(BeatMapError::decode_with(path, "decoder failure", e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {} channel(s), {:.2}s",
        all_samples.len(),
        sample_rate,
        channels,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Band-limited sinc resampling of a mono buffer, shifted so sample `n` of the
/// output lines up with time `n / to_rate`.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> std::result::Result<Vec<f32>, BoxError> {
    let ratio = to_rate as f64 / from_rate as f64;
    let offset = measure_offset(ratio)?;
    log::debug!("Resampler offset: {} output samples", offset);

    let output = sinc_resample(samples, ratio)?;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let mut aligned: Vec<f32> = if offset >= 0 {
        output.into_iter().skip(offset as usize).take(expected).collect()
    } else {
        std::iter::repeat(0.0)
            .take(offset.unsigned_abs())
            .chain(output)
            .take(expected)
            .collect()
    };
    aligned.resize(expected, 0.0);
    Ok(aligned)
}

/// One full-length `process` call followed by a flush. No alignment applied.
fn sinc_resample(samples: &[f32], ratio: f64) -> std::result::Result<Vec<f32>, BoxError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)?;

    let input = vec![samples.to_vec()];
    let mut output = resampler
        .process(&input, None)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)?
        .into_iter()
        .next()
        .unwrap_or_default();
    output.extend(tail);
    Ok(output)
}

/// Signed shift, in output samples, that `sinc_resample` introduces at `ratio`,
/// measured by pushing an impulse through the same call pattern.
fn measure_offset(ratio: f64) -> std::result::Result<isize, BoxError> {
    const LEN: usize = 4096;
    const POS: usize = 2048;

    let mut impulse = vec![0.0f32; LEN];
    impulse[POS] = 1.0;
    let response = sinc_resample(&impulse, ratio)?;

    let peak = response
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    let ideal = (POS as f64 * ratio).round() as isize;
    Ok(peak as isize - ideal)
}
