//! Integration Tests
//!
//! End-to-end tests for the melbridge feature pipeline.

use std::fs;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

use melbridge::config::{NormalizationPolicy, PipelineConfig};
use melbridge::engine::{generate_test_tone, write_wav, AudioConfig, Waveform, WaveformLoader};
use melbridge::features::FeatureExtractor;
use melbridge::model::export_input;
use melbridge::tensor::codec;
use melbridge::MelBridgeError;

/// Default config, but with a duration that yields exactly 128 frames
fn unresized_config() -> PipelineConfig {
    PipelineConfig {
        // round(22050 * 2.95) = 65048 samples -> 1 + 65048 / 512 = 128 frames
        duration_secs: 2.95,
        ..PipelineConfig::default()
    }
}

// === Full Pipeline Tests ===

#[test]
fn test_short_clip_to_input_file() {
    let dir = tempdir().unwrap();
    let wav_path = dir.path().join("clip.wav");
    let bin_path = dir.path().join("test_input.bin");

    let tone = generate_test_tone(440.0, 1.5, 22050);
    write_wav(&tone, &wav_path, 16).unwrap();

    let config = PipelineConfig::default();
    let loader = WaveformLoader::new(AudioConfig::from(&config));
    let waveform = loader.load(&wav_path).unwrap();
    assert_eq!(waveform.len(), 66_150);
    // second half is padding
    assert!(waveform.as_slice()[33_075..].iter().all(|&s| s == 0.0));

    let tensor = FeatureExtractor::new(config).unwrap().extract(&waveform).unwrap();
    assert_eq!(tensor.shape(), &[128, 128, 1]);

    export_input(&tensor, &bin_path).unwrap();
    assert_eq!(fs::metadata(&bin_path).unwrap().len(), 65_536);

    let loaded = codec::read_tensor(&bin_path, 16_384).unwrap();
    assert_eq!(codec::first_bit_difference(tensor.as_slice(), &loaded), None);
}

#[test]
fn test_loader_resamples_and_downmixes() {
    let dir = tempdir().unwrap();
    let wav_path = dir.path().join("stereo_44k.wav");

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
    for _ in 0..44_100 {
        writer.write_sample(8192_i16).unwrap();
        writer.write_sample(-8192_i16).unwrap();
    }
    writer.finalize().unwrap();

    let loader = WaveformLoader::new(AudioConfig::new(22_050, 3.0));
    let waveform = loader.load(&wav_path).unwrap();

    assert_eq!(waveform.sample_rate, 22_050);
    assert_eq!(waveform.len(), 66_150);
    // opposite channels cancel in the downmix
    assert!(waveform.as_slice().iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn test_loader_does_not_alias_on_downsampling() {
    let dir = tempdir().unwrap();
    let wav_path = dir.path().join("tone_15k_44k.wav");

    // 15 kHz sits above the 11.025 kHz Nyquist of the canonical rate
    write_wav(&generate_test_tone(15_000.0, 1.0, 44_100), &wav_path, 32).unwrap();

    let loader = WaveformLoader::new(AudioConfig::new(22_050, 1.0));
    let waveform = loader.load(&wav_path).unwrap();
    assert_eq!(waveform.len(), 22_050);

    let body = &waveform.as_slice()[2_000..20_000];
    let rms = (body.iter().map(|s| s * s).sum::<f32>() / body.len() as f32).sqrt();
    assert!(rms < 0.01, "aliased rms {}", rms);
}

#[test]
fn test_missing_source() {
    let dir = tempdir().unwrap();
    let loader = WaveformLoader::new(AudioConfig::new(22_050, 3.0));

    match loader.load(&dir.path().join("absent.wav")).unwrap_err() {
        MelBridgeError::SourceNotFound { path } => assert!(path.ends_with("absent.wav")),
        other => panic!("Expected SourceNotFound, got: {:?}", other),
    }
}

#[test]
fn test_undecodable_source() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("noise.wav");
    fs::write(&path, b"this is not a wav file").unwrap();

    let loader = WaveformLoader::new(AudioConfig::new(22_050, 3.0));
    let err = loader.load(&path).unwrap_err();
    assert_eq!(err.error_code(), "DECODE_ERROR");
}

// === Extractor Properties ===

#[test_case(0.1 ; "much shorter than target")]
#[test_case(1.5 ; "half the target")]
#[test_case(3.0 ; "exact target")]
#[test_case(7.0 ; "longer than target")]
fn test_shape_is_fixed_regardless_of_length(duration_secs: f32) {
    let config = PipelineConfig::default();
    let loader = WaveformLoader::new(AudioConfig::from(&config));
    let tone = generate_test_tone(880.0, duration_secs, 22_050);
    let waveform = loader.conform(tone.samples, 22_050).unwrap();

    let tensor = FeatureExtractor::new(config).unwrap().extract(&waveform).unwrap();
    assert_eq!(tensor.shape(), &[128, 128, 1]);
    assert_eq!(tensor.len(), 16_384);
}

#[test]
fn test_extraction_is_idempotent() {
    let config = PipelineConfig::default();
    let extractor = FeatureExtractor::new(config).unwrap();
    let waveform = generate_test_tone(330.0, 3.0, 22_050);

    let first = extractor.extract(&waveform).unwrap();
    let second = extractor.extract(&waveform).unwrap();
    assert_eq!(codec::first_bit_difference(first.as_slice(), second.as_slice()), None);
}

#[test]
fn test_unresized_output_spans_unit_interval() {
    let config = unresized_config();
    let loader = WaveformLoader::new(AudioConfig::from(&config));
    let waveform = loader
        .conform(generate_test_tone(440.0, 2.0, 22_050).samples, 22_050)
        .unwrap();
    assert_eq!(waveform.len(), 65_048);

    let tensor = FeatureExtractor::new(config).unwrap().extract(&waveform).unwrap();
    let (min, max) = tensor.min_max().unwrap();
    assert_relative_eq!(min, 0.0);
    assert_relative_eq!(max, 1.0);
}

#[test]
fn test_resized_output_stays_in_unit_interval() {
    let extractor = FeatureExtractor::new(PipelineConfig::default()).unwrap();
    let tensor = extractor.extract(&generate_test_tone(440.0, 3.0, 22_050)).unwrap();

    assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_silence_zero_fill() {
    let extractor = FeatureExtractor::new(PipelineConfig::default()).unwrap();
    let tensor = extractor.extract(&Waveform::silence(66_150, 22_050)).unwrap();

    assert_eq!(tensor.shape(), &[128, 128, 1]);
    assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_silence_reject() {
    let config = PipelineConfig {
        normalization: NormalizationPolicy::Reject,
        ..PipelineConfig::default()
    };
    let extractor = FeatureExtractor::new(config).unwrap();

    let err = extractor.extract(&Waveform::silence(66_150, 22_050)).unwrap_err();
    assert_eq!(err.error_code(), "DEGENERATE_NORMALIZATION");
}

#[test]
fn test_sample_rate_mismatch_is_rejected() {
    let extractor = FeatureExtractor::new(PipelineConfig::default()).unwrap();
    let waveform = generate_test_tone(440.0, 3.0, 16_000);

    let err = extractor.extract(&waveform).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("melbridge.json");
    fs::write(
        &path,
        r#"{"pipeline": {"duration_secs": 2.95, "normalization": "reject"}}"#,
    )
    .unwrap();

    let config = melbridge::Config::from_json_file(&path).unwrap();
    assert_eq!(config.pipeline, PipelineConfig {
        normalization: NormalizationPolicy::Reject,
        ..unresized_config()
    });
    assert_eq!(config.verify, melbridge::VerifyConfig::default());
}
