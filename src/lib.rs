//! melbridge - audio front end and tensor bridge for a mel-spectrogram CNN
//!
//! Produces the exact input tensor an audio classifier expects and moves the
//! classifier's weights between implementations as raw float32 files:
//! 1. Feature pipeline - WAV to a normalized `(128, 128, 1)` mel tensor
//! 2. Tensor bridge - headerless binary export, loading contract, verification
//!
//! # Architecture
//!
//! - `engine`: waveform loading and conditioning
//! - `features`: mel analysis, dB scaling, normalization, resize
//! - `tensor`: shaped buffers and the binary file codec
//! - `model`: architecture descriptor, reference weights, export, labels
//! - `verify`: cross-implementation comparison and reports

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod tensor;
pub mod verify;

pub use config::{Config, PipelineConfig, VerifyConfig};
pub use error::{MelBridgeError, Result};
