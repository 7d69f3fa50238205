//! Feature Module
//!
//! Mel-spectrogram analysis and the normalized tensor pipeline built on it.

pub mod extractor;
pub mod mel;

pub use extractor::{min_max_normalize, power_to_db, resize_bilinear, FeatureExtractor};
pub use mel::{MelAnalyzer, MelFilterBank, MelSpectrogram};
