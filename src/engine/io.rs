//! Waveform loading for Melbridge
//!
//! Decodes WAV files into the canonical mono waveform: downmixed to one
//! channel, converted to the configured sample rate and forced to exactly
//! `round(sample_rate * duration)` samples.
//!
//! Sample rate conversion is band-limited (FFT-based sinc resampling via
//! `rubato`), so content above the new Nyquist frequency is removed rather
//! than folded back. Only the rate is resampled; the length is fixed
//! afterwards by zero padding or truncation.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FftFixedInOut, Resampler};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::engine::waveform::Waveform;
use crate::error::{MelBridgeError, Result};

/// Sample rate and duration the loader conforms audio to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl AudioConfig {
    pub fn new(sample_rate: u32, duration_secs: f64) -> Self {
        AudioConfig {
            sample_rate,
            duration_secs,
        }
    }

    /// Exact output length: `round(sample_rate * duration)`, never truncated
    pub fn target_length(&self) -> usize {
        (self.sample_rate as f64 * self.duration_secs).round() as usize
    }
}

impl From<&PipelineConfig> for AudioConfig {
    fn from(config: &PipelineConfig) -> Self {
        AudioConfig::new(config.sample_rate, config.duration_secs)
    }
}

/// Decodes audio sources into canonical waveforms
#[derive(Debug, Clone)]
pub struct WaveformLoader {
    config: AudioConfig,
}

impl WaveformLoader {
    pub fn new(config: AudioConfig) -> Self {
        WaveformLoader { config }
    }

    /// Load a WAV file and conform it to the canonical rate and length
    ///
    /// # Errors
    /// * `SourceNotFound` - If the file does not exist
    /// * `DecodeError` - If the file is not a readable WAV container
    /// * `UnsupportedFormat` - If the bit depth cannot be decoded
    pub fn load(&self, path: &Path) -> Result<Waveform> {
        if !path.exists() {
            return Err(MelBridgeError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let reader = WavReader::open(path).map_err(|e| MelBridgeError::DecodeError {
            reason: format!("Failed to open WAV file {}: {}", path.display(), e),
            source: Some(Box::new(e)),
        })?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(MelBridgeError::DecodeError {
                reason: "WAV header declares zero channels".to_string(),
                source: None,
            });
        }

        let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
        let mono = downmix(&interleaved, channels);

        debug!(
            path = %path.display(),
            channels,
            source_rate = spec.sample_rate,
            frames = mono.len(),
            "decoded audio"
        );

        let waveform = self.conform(mono, spec.sample_rate)?;
        if !waveform.is_finite() {
            return Err(MelBridgeError::DecodeError {
                reason: format!("{} contains NaN or infinite samples", path.display()),
                source: None,
            });
        }
        info!(
            path = %path.display(),
            samples = waveform.len(),
            sample_rate = waveform.sample_rate,
            "loaded waveform"
        );
        Ok(waveform)
    }

    /// Conform in-memory mono audio to the canonical rate and length
    ///
    /// # Errors
    /// * `DecodeError` - If the source rate is zero or the resampler fails
    pub fn conform(&self, samples: Vec<f32>, source_rate: u32) -> Result<Waveform> {
        if source_rate == 0 {
            return Err(MelBridgeError::DecodeError {
                reason: "source sample rate is zero".to_string(),
                source: None,
            });
        }

        let resampled = if source_rate != self.config.sample_rate {
            resample(&samples, source_rate, self.config.sample_rate)?
        } else {
            samples
        };

        let mut waveform = Waveform::new(resampled, self.config.sample_rate);
        waveform.fit_to_length(self.config.target_length());
        Ok(waveform)
    }
}

/// Write a mono waveform to a WAV file (16-bit integer or 32-bit float)
pub fn write_wav(waveform: &Waveform, path: &Path, bit_depth: u16) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(hound_to_io)?;

    match bit_depth {
        16 => {
            for &sample in &waveform.samples {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        32 => {
            for &sample in &waveform.samples {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
        _ => {
            return Err(MelBridgeError::UnsupportedFormat {
                format: format!("{}-bit output (only 16 and 32 supported)", bit_depth),
            });
        }
    }

    writer.finalize().map_err(hound_to_io)?;
    Ok(())
}

/// Generate a mono sine wave, useful as a deterministic test signal
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Waveform {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect();

    Waveform::new(samples, sample_rate)
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn hound_to_io(e: hound::Error) -> MelBridgeError {
    match e {
        hound::Error::IoError(io) => MelBridgeError::Io(io),
        other => MelBridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

fn decode_error(bits: u16) -> impl Fn(hound::Error) -> MelBridgeError {
    move |e| MelBridgeError::DecodeError {
        reason: format!("Failed to read {}-bit samples: {}", bits, e),
        source: Some(Box::new(e)),
    }
}

/// Read samples from WAV reader and convert to f32 in [-1, 1]
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(MelBridgeError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits_per_sample),
                    })
                }
            };
            // hound widens every integer depth to i32 on request
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(decode_error(bits_per_sample))
        }
    }
}

/// Average interleaved channels into one
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Input frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

fn resample_error(from_rate: u32, to_rate: u32, e: impl std::fmt::Display) -> MelBridgeError {
    MelBridgeError::DecodeError {
        reason: format!("Resampling {} Hz -> {} Hz failed: {}", from_rate, to_rate, e),
        source: None,
    }
}

/// Band-limited resampling from `from_rate` to `to_rate`
///
/// Output has `round(len * to_rate / from_rate)` samples, aligned with the
/// input: the resampler's filter delay is trimmed from the front.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;

    let expected_len =
        (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected_len + delay + RESAMPLE_CHUNK);

    let mut pos = 0;
    // zero chunks past the end flush the filter tail
    while output.len() < expected_len + delay {
        let chunk_size = resampler.input_frames_next();
        let end = (pos + chunk_size).min(samples.len());
        let mut chunk = samples.get(pos..end).unwrap_or(&[]).to_vec();
        chunk.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[chunk], None)
            .map_err(|e| resample_error(from_rate, to_rate, e))?;
        output.extend_from_slice(&result[0]);
        pos += chunk_size;
    }

    output.drain(..delay);
    output.truncate(expected_len);
    debug!(from_rate, to_rate, frames = output.len(), "resampled audio");
    Ok(output)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn loader() -> WaveformLoader {
        WaveformLoader::new(AudioConfig::new(22050, 3.0))
    }

    #[test]
    fn test_conform_pads_short_audio() {
        let samples = vec![0.25_f32; 1000];
        let wave = loader().conform(samples, 22050).unwrap();

        assert_eq!(wave.len(), 66150);
        assert!(wave.samples[..1000].iter().all(|&s| s == 0.25));
        assert!(wave.samples[1000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_conform_truncates_long_audio() {
        let samples: Vec<f32> = (0..100_000).map(|i| i as f32).collect();
        let wave = loader().conform(samples, 22050).unwrap();

        assert_eq!(wave.len(), 66150);
        assert_eq!(wave.samples[66149], 66149.0);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let interleaved = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&interleaved, 2), vec![0.5, 0.5, 0.0]);
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_target_length_rounds() {
        // 1.5435 samples rounds to 2, not truncated to 1
        assert_eq!(AudioConfig::new(22050, 0.00007).target_length(), 2);
        assert_eq!(AudioConfig::new(22050, 3.0).target_length(), 66150);
    }

    #[test]
    fn test_resample_length() {
        let tone = generate_test_tone(440.0, 1.0, 44100);
        assert_eq!(resample(&tone.samples, 44100, 22050).unwrap().len(), 22050);

        let tone = generate_test_tone(440.0, 0.5, 16000);
        assert_eq!(resample(&tone.samples, 16000, 22050).unwrap().len(), 11025);
    }

    #[test]
    fn test_resample_keeps_passband() {
        let tone = generate_test_tone(1000.0, 1.0, 44100);
        let out = resample(&tone.samples, 44100, 22050).unwrap();

        // skip the edges where the filter ramps in and out
        let level = rms(&out[2000..20000]);
        assert!((level - 0.7071).abs() < 0.02, "passband rms {}", level);
    }

    #[test]
    fn test_resample_suppresses_above_nyquist() {
        // 15 kHz is above the 11.025 kHz Nyquist of the target rate
        let tone = generate_test_tone(15000.0, 1.0, 44100);
        let out = resample(&tone.samples, 44100, 22050).unwrap();

        let level = rms(&out[2000..20000]);
        assert!(level < 0.01, "aliased rms {}", level);
    }

    #[test]
    fn test_conform_rejects_zero_rate() {
        let err = loader().conform(vec![0.0; 10], 0).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_load_resamples_rate_then_fixes_length() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone_44k.wav");

        // One second at 44.1kHz becomes one second at 22.05kHz, then padded
        let tone = generate_test_tone(440.0, 1.0, 44100);
        write_wav(&tone, &path, 32).unwrap();

        let wave = loader().load(&path).unwrap();
        assert_eq!(wave.sample_rate, 22050);
        assert_eq!(wave.len(), 66150);
        assert!(wave.samples[22060..].iter().all(|&s| s == 0.0));
        assert!(wave.samples[..22000].iter().any(|&s| s.abs() > 0.5));
    }

    #[test]
    fn test_load_16bit_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone_16.wav");

        let tone = generate_test_tone(1000.0, 0.5, 22050);
        write_wav(&tone, &path, 16).unwrap();

        let wave = loader().load(&path).unwrap();
        for (orig, loaded) in tone.samples.iter().zip(wave.samples.iter()) {
            assert!((orig - loaded).abs() < 1e-3, "{} vs {}", orig, loaded);
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = loader().load(Path::new("/nonexistent/path/audio.wav"));

        match result.unwrap_err() {
            MelBridgeError::SourceNotFound { path } => {
                assert!(path.display().to_string().contains("nonexistent"));
            }
            other => panic!("Expected SourceNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_non_finite_samples() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nan.wav");
        let wave = Waveform::new(vec![0.1, f32::NAN, 0.2], 22050);
        write_wav(&wave, &path, 32).unwrap();

        let err = loader().load(&path).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }

    #[test]
    fn test_load_garbage_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not_audio.wav");
        std::fs::write(&path, b"definitely not a RIFF header").unwrap();

        let err = loader().load(&path).unwrap_err();
        assert_eq!(err.error_code(), "DECODE_ERROR");
    }
}
