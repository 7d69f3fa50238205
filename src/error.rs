//! Error handling for Melbridge
//!
//! Structural errors abort the single operation they occur in. Numeric
//! mismatches found during a verification run are recorded instead, see
//! [`crate::verify`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Melbridge operations
pub type Result<T> = std::result::Result<T, MelBridgeError>;

/// Main error type for Melbridge operations
#[derive(Error, Debug)]
pub enum MelBridgeError {
    // Waveform stage
    #[error("Audio source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Failed to decode audio: {reason}")]
    DecodeError {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // Feature stage
    #[error("Cannot normalize spectrogram: decibel range is zero (all values {value:.3} dB)")]
    DegenerateNormalization { value: f32 },

    // Codec stage
    #[error("Truncated tensor file {}: expected {expected_bytes} bytes, found {actual_bytes}", path.display())]
    TruncatedFile {
        path: PathBuf,
        expected_bytes: u64,
        actual_bytes: u64,
    },

    #[error("Tensor file {} has trailing data: expected {expected_bytes} bytes, found {actual_bytes}", path.display())]
    TrailingBytes {
        path: PathBuf,
        expected_bytes: u64,
        actual_bytes: u64,
    },

    #[error("Round-trip check failed for {}: element {index} differs after read-back", path.display())]
    RoundTripMismatch { path: PathBuf, index: usize },

    // Tensor and verification
    #[error("Size mismatch for {name}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Value mismatch for {name}: max abs difference {max_abs_diff:e} exceeds {tolerance:e}")]
    ValueMismatch {
        name: String,
        max_abs_diff: f32,
        tolerance: f32,
    },

    #[error("Expected tensor file is missing: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("Invalid tensor: {reason}")]
    InvalidTensor { reason: String },

    // Configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MelBridgeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MelBridgeError::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            MelBridgeError::DecodeError { .. } => "DECODE_ERROR",
            MelBridgeError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            MelBridgeError::DegenerateNormalization { .. } => "DEGENERATE_NORMALIZATION",
            MelBridgeError::TruncatedFile { .. } => "TRUNCATED_FILE",
            MelBridgeError::TrailingBytes { .. } => "TRAILING_BYTES",
            MelBridgeError::RoundTripMismatch { .. } => "ROUND_TRIP_MISMATCH",
            MelBridgeError::SizeMismatch { .. } => "SIZE_MISMATCH",
            MelBridgeError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            MelBridgeError::ValueMismatch { .. } => "VALUE_MISMATCH",
            MelBridgeError::MissingFile { .. } => "MISSING_FILE",
            MelBridgeError::InvalidTensor { .. } => "INVALID_TENSOR",
            MelBridgeError::InvalidConfig { .. } => "INVALID_CONFIG",
            MelBridgeError::Io(_) => "IO_ERROR",
            MelBridgeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if the failure is numeric rather than structural.
    ///
    /// Only value mismatches let a verification run continue; everything else
    /// points at misconfiguration or corruption.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MelBridgeError::ValueMismatch { .. })
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MelBridgeError::SourceNotFound { .. } => vec![
                "Check the audio path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            MelBridgeError::DecodeError { .. } | MelBridgeError::UnsupportedFormat { .. } => vec![
                "Convert the file to 16-bit, 24-bit or float WAV first",
                "Check if the file plays in another application",
            ],
            MelBridgeError::DegenerateNormalization { .. } => vec![
                "The input is silent or constant; pick a different clip",
                "Use the zero-fill normalization policy to accept silent input",
            ],
            MelBridgeError::TruncatedFile { .. }
            | MelBridgeError::TrailingBytes { .. }
            | MelBridgeError::SizeMismatch { .. } => vec![
                "Re-export the tensor file from the reference model",
                "Check the file was written as raw float32 without a header",
            ],
            MelBridgeError::ShapeMismatch { .. } => vec![
                "Regenerate the architecture descriptor from the trained model",
            ],
            MelBridgeError::MissingFile { .. } => vec![
                "Run export-weights to produce the missing files",
                "Check the weights directory path",
            ],
            MelBridgeError::RoundTripMismatch { .. } => vec![
                "The export target may be corrupting writes; try another location",
            ],
            _ => vec![],
        }
    }
}
