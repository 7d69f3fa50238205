//! Audio Engine Module
//!
//! Waveform type and loading:
//! - Canonical mono waveform
//! - WAV decoding, downmix, rate conversion, pad/truncate

pub mod io;
pub mod waveform;

pub use io::{generate_test_tone, write_wav, AudioConfig, WaveformLoader};
pub use waveform::Waveform;
