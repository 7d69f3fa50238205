//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{AudioConfig, WaveformLoader};
use crate::error::{MelBridgeError, Result};
use crate::features::FeatureExtractor;
use crate::model::{
    export_input, export_weights, top_k, ArchitectureDescriptor, ExportManifest, LoadingContract,
    StoredModel, MANIFEST_FILE,
};
use crate::tensor::codec;
use crate::verify::{
    render_contract, render_predictions, render_summary, VerificationSummary, Verifier,
};

/// Load the configuration file, or defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            Config::from_json_file(path)
        }
        None => Ok(Config::default()),
    }
}

/// Extract the input tensor from an audio file and write it.
pub fn extract(config: &Config, audio: &Path, output: &Path) -> Result<()> {
    info!("Extracting features from: {}", audio.display());

    let loader = WaveformLoader::new(AudioConfig::from(&config.pipeline));
    let waveform = loader.load(audio)?;

    let extractor = FeatureExtractor::new(config.pipeline.clone())?;
    let tensor = extractor.extract(&waveform)?;

    let expected = ArchitectureDescriptor::audio_cnn().input_shape();
    if tensor.shape() != expected {
        return Err(MelBridgeError::ShapeMismatch {
            name: "input".to_string(),
            expected: expected.to_vec(),
            actual: tensor.shape().to_vec(),
        });
    }
    let bytes = export_input(&tensor, output)?;

    println!("Input tensor written: {}", output.display());
    println!("Shape: {:?}", tensor.shape());
    if let Some((min, max)) = tensor.min_max() {
        println!("Range: [{:.4}, {:.4}]", min, max);
    }
    println!("Bytes: {}", bytes);

    Ok(())
}

/// Export every weight and bias of a reference model dump.
pub fn export(model_path: &Path, output: &Path) -> Result<()> {
    info!("Exporting weights from: {}", model_path.display());

    let model = StoredModel::from_json_file(model_path)?;
    let manifest = export_weights(&model, ArchitectureDescriptor::audio_cnn(), output)?;

    println!("Exported {} files to {}", manifest.files.len(), output.display());
    println!(
        "Total: {} bytes ({:.2} MB)",
        manifest.total_bytes,
        manifest.total_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("Export id: {}", manifest.export_id);

    Ok(())
}

/// Verify weight files. Returns whether every check passed.
pub fn verify_weights(config: &Config, model_path: &Path, weights_dir: &Path) -> Result<bool> {
    let descriptor = ArchitectureDescriptor::audio_cnn();
    let model = if model_path.is_dir() {
        StoredModel::from_bin_dir(model_path, descriptor)?
    } else {
        StoredModel::from_json_file(model_path)?
    };

    let verifier = Verifier::new(descriptor, config.verify.clone());
    let summary = verifier.verify_weights(&model, weights_dir);
    print!("{}", render_summary("Weight verification", &summary));

    if weights_dir.join(MANIFEST_FILE).exists() {
        let manifest = ExportManifest::load(weights_dir)?;
        let stale = manifest.stale_files(weights_dir)?;
        for file in &stale {
            warn!(file = %file, export_id = %manifest.export_id, "checksum differs from export manifest");
            println!("Changed since export {}: {}", manifest.export_id, file);
        }
    }

    Ok(finish(summary))
}

/// Verify per-layer feature maps. Returns whether every check passed.
pub fn verify_features(config: &Config, reference: &Path, candidate: &Path) -> Result<bool> {
    let verifier = Verifier::new(ArchitectureDescriptor::audio_cnn(), config.verify.clone());
    let summary = verifier.verify_feature_maps(reference, candidate)?;
    print!("{}", render_summary("Feature map verification", &summary));

    if summary.total() == 0 {
        println!("No reference feature maps found in {}", reference.display());
    }

    Ok(finish(summary))
}

/// Verdict of a verification run, with hints for its first failure
fn finish(summary: VerificationSummary) -> bool {
    let passed = summary.is_success();
    if let Err(err) = summary.into_result() {
        warn!(
            code = err.error_code(),
            recoverable = err.is_recoverable(),
            "first failure: {}",
            err
        );
        print_hints(&err);
    }
    passed
}

/// Print recovery hints for an error to stderr.
pub fn print_hints(err: &MelBridgeError) {
    for hint in err.recovery_suggestions() {
        eprintln!("  hint: {}", hint);
    }
}

/// Print the loading contract.
pub fn show_contract(config: &Config, json: bool) -> Result<()> {
    let contract = LoadingContract::new(ArchitectureDescriptor::audio_cnn(), &config.pipeline);
    if json {
        println!("{}", contract.to_json()?);
    } else {
        print!("{}", render_contract(&contract));
    }
    Ok(())
}

/// Rank the classes in a classifier output file.
pub fn predict(output: &Path, k: usize) -> Result<()> {
    info!("Reading classifier output: {}", output.display());

    let num_classes = ArchitectureDescriptor::audio_cnn().num_classes();
    let probabilities = codec::read_tensor(output, num_classes)?;
    let ranked = top_k(&probabilities, k)?;

    println!("Top {} predictions:", ranked.len());
    print!("{}", render_predictions(&ranked));

    Ok(())
}
