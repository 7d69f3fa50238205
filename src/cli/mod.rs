//! CLI Module
//!
//! Command-line interface for the melbridge feature pipeline and tensor bridge.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// melbridge - mel-spectrogram input and weight bridge for an audio CNN
#[derive(Parser, Debug)]
#[command(name = "melbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (JSON); missing fields take defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Turn an audio file into the canonical input tensor file
    #[command(name = "extract")]
    Extract {
        /// Input audio file
        audio: PathBuf,

        /// Output tensor file
        #[arg(short, long, default_value = "test_input.bin")]
        output: PathBuf,
    },

    /// Export reference weights as raw float32 files
    #[command(name = "export-weights")]
    ExportWeights {
        /// Reference model JSON dump
        #[arg(short, long)]
        model: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "model_weights")]
        output: PathBuf,
    },

    /// Verify weight files against the reference model
    #[command(name = "verify-weights")]
    VerifyWeights {
        /// Reference model: JSON dump or directory of .bin files
        #[arg(short, long)]
        model: PathBuf,

        /// Directory holding the files to check
        #[arg(short, long, default_value = "model_weights")]
        weights_dir: PathBuf,
    },

    /// Compare per-layer feature maps of two forward passes
    #[command(name = "verify-features")]
    VerifyFeatures {
        /// Directory with the reference layer outputs
        #[arg(short, long)]
        reference: PathBuf,

        /// Directory with the candidate layer outputs
        #[arg(long)]
        candidate: PathBuf,
    },

    /// Print the loading contract
    #[command(name = "contract")]
    Contract {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rank a classifier output file
    #[command(name = "predict")]
    Predict {
        /// Output tensor file (10 float32 probabilities)
        output: PathBuf,

        /// Number of classes to show
        #[arg(short = 'k', long, default_value_t = 5)]
        top: usize,
    },
}
