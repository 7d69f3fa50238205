//! Pipeline and verification configuration
//!
//! All parameters are plain values handed to constructors. Nothing here is
//! global, so several configurations can live side by side (tests rely on it).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MelBridgeError, Result};

/// Sample rate of the canonical waveform (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Duration of the canonical waveform (seconds)
pub const DEFAULT_DURATION_SECS: f64 = 3.0;

/// STFT frame size
pub const DEFAULT_N_FFT: usize = 2048;

/// STFT hop size
pub const DEFAULT_HOP_LENGTH: usize = 512;

/// Number of mel filter banks
pub const DEFAULT_N_MELS: usize = 128;

/// Maximum absolute difference accepted for weight and bias files
pub const DEFAULT_WEIGHT_TOLERANCE: f32 = 1e-6;

/// Maximum absolute difference accepted for per-layer feature maps
pub const DEFAULT_FEATURE_MAP_TOLERANCE: f32 = 1e-4;

/// How the STFT pads the signal before framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadMode {
    /// Zero padding on both sides
    #[default]
    Constant,
    /// Mirror the signal around its edges (excluding the edge sample)
    Reflect,
}

/// What to do when the decibel spectrogram has zero range (e.g. silence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Emit an all-zero tensor
    #[default]
    ZeroFill,
    /// Fail with `DegenerateNormalization`
    Reject,
}

/// Fixed output shape of the feature extractor: (rows, cols, channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetShape {
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
}

impl TargetShape {
    pub fn dims(&self) -> Vec<usize> {
        vec![self.rows, self.cols, self.channels]
    }

    pub fn num_elements(&self) -> usize {
        self.rows * self.cols * self.channels
    }

    /// Size in bytes of the binary file holding one tensor of this shape
    pub fn num_bytes(&self) -> u64 {
        self.num_elements() as u64 * 4
    }
}

impl Default for TargetShape {
    fn default() -> Self {
        TargetShape {
            rows: 128,
            cols: 128,
            channels: 1,
        }
    }
}

/// Audio and feature extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Canonical sample rate in Hz (default: 22050)
    pub sample_rate: u32,
    /// Canonical duration in seconds (default: 3.0)
    pub duration_secs: f64,
    /// STFT frame size (default: 2048)
    pub n_fft: usize,
    /// STFT hop size (default: 512)
    pub hop_length: usize,
    /// Number of mel bands (default: 128)
    pub n_mels: usize,
    /// Lowest mel filter edge in Hz
    pub fmin: f64,
    /// Highest mel filter edge in Hz; `None` means Nyquist
    pub fmax: Option<f64>,
    /// Output tensor shape
    pub target_shape: TargetShape,
    /// Dynamic range floor below the peak, in dB; `None` disables it
    pub top_db: Option<f64>,
    pub pad_mode: PadMode,
    pub normalization: NormalizationPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            duration_secs: DEFAULT_DURATION_SECS,
            n_fft: DEFAULT_N_FFT,
            hop_length: DEFAULT_HOP_LENGTH,
            n_mels: DEFAULT_N_MELS,
            fmin: 0.0,
            fmax: None,
            target_shape: TargetShape::default(),
            top_db: Some(80.0),
            pad_mode: PadMode::Constant,
            normalization: NormalizationPolicy::ZeroFill,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Upper mel edge, resolved against Nyquist
    pub fn resolved_fmax(&self) -> f64 {
        self.fmax.unwrap_or(self.sample_rate as f64 / 2.0)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(MelBridgeError::InvalidConfig { reason });

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".to_string());
        }
        if !(self.duration_secs > 0.0) {
            return invalid(format!("duration_secs must be positive, got {}", self.duration_secs));
        }
        if self.n_fft == 0 || self.hop_length == 0 || self.n_mels == 0 {
            return invalid("n_fft, hop_length and n_mels must be positive".to_string());
        }
        if self.n_fft % 2 != 0 {
            return invalid(format!("n_fft must be even, got {}", self.n_fft));
        }
        if self.hop_length > self.n_fft {
            return invalid(format!(
                "hop_length {} exceeds n_fft {}",
                self.hop_length, self.n_fft
            ));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        let fmax = self.resolved_fmax();
        if self.fmin < 0.0 || fmax > nyquist || self.fmin >= fmax {
            return invalid(format!(
                "mel range [{}, {}] must lie within [0, {}]",
                self.fmin, fmax, nyquist
            ));
        }
        if self.target_shape.num_elements() == 0 {
            return invalid("target_shape dimensions must be positive".to_string());
        }
        if self.target_shape.channels != 1 {
            return invalid("only single-channel spectrograms are supported".to_string());
        }
        if let Some(top_db) = self.top_db {
            if top_db < 0.0 {
                return invalid(format!("top_db must be non-negative, got {}", top_db));
            }
        }
        Ok(())
    }
}

/// Tolerances for the cross-implementation verifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Strict upper bound on max abs difference for weights/biases
    pub weight_tolerance: f32,
    /// Strict upper bound on max abs difference for feature maps
    pub feature_map_tolerance: f32,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        VerifyConfig {
            weight_tolerance: DEFAULT_WEIGHT_TOLERANCE,
            feature_map_tolerance: DEFAULT_FEATURE_MAP_TOLERANCE,
        }
    }
}

impl VerifyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.weight_tolerance > 0.0) || !(self.feature_map_tolerance > 0.0) {
            return Err(MelBridgeError::InvalidConfig {
                reason: "tolerances must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub verify: VerifyConfig,
}

impl Config {
    /// Load a combined configuration file. Missing sections take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.pipeline.validate()?;
        config.verify.validate()?;
        Ok(config)
    }
}
