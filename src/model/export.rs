//! Weight and input export
//!
//! Every file is written through [`codec::write_verified`], so a successful
//! export guarantees the bytes on disk read back bit-identical. The weights
//! directory also gets a `manifest.json` with checksums.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::error::{MelBridgeError, Result};
use crate::model::architecture::{ArchitectureDescriptor, ContractEntry, TensorSpec};
use crate::model::provider::ReferenceModel;
use crate::tensor::{codec, Tensor, TensorId};

/// File name of the export manifest inside a weights directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// One exported file with its checksum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(flatten)]
    pub contract: ContractEntry,
    pub sha256: String,
}

/// Record of one export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub export_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub architecture: String,
    pub files: Vec<ManifestEntry>,
    pub total_bytes: u64,
}

impl ExportManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(MelBridgeError::MissingFile { path });
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Re-hash every listed file and return those whose checksum changed
    ///
    /// Files that no longer exist are not listed.
    pub fn stale_files(&self, dir: &Path) -> Result<Vec<String>> {
        let mut stale = Vec::new();
        for entry in &self.files {
            let path = dir.join(&entry.contract.file);
            if !path.exists() {
                continue;
            }
            let bytes = fs::read(&path)?;
            if sha256_hex(&bytes) != entry.sha256 {
                stale.push(entry.contract.file.clone());
            }
        }
        Ok(stale)
    }
}

/// Hex-encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn check_shape(id: &TensorId, expected: &[usize], tensor: &Tensor) -> Result<()> {
    if tensor.shape() != expected {
        return Err(MelBridgeError::ShapeMismatch {
            name: id.to_string(),
            expected: expected.to_vec(),
            actual: tensor.shape().to_vec(),
        });
    }
    Ok(())
}

/// Export every descriptor tensor of `model` into `dir`
///
/// Shapes are checked against the descriptor before anything is written; a
/// layer the descriptor does not know, or a missing tensor, aborts the export.
pub fn export_weights(
    model: &dyn ReferenceModel,
    descriptor: &ArchitectureDescriptor,
    dir: &Path,
) -> Result<ExportManifest> {
    let specs: Vec<TensorSpec> = descriptor.tensor_specs().collect();

    for layer in model.layers() {
        if descriptor.get(&layer.name).is_none() {
            return Err(MelBridgeError::InvalidTensor {
                reason: format!("layer '{}' is not in the {} descriptor", layer.name, descriptor.name()),
            });
        }
    }

    let mut tensors = Vec::with_capacity(specs.len());
    for spec in &specs {
        let tensor = model
            .tensor(&spec.id.layer, spec.id.kind)
            .ok_or_else(|| MelBridgeError::InvalidTensor {
                reason: format!("reference model has no {} tensor", spec.id),
            })?;
        check_shape(&spec.id, spec.shape, tensor)?;
        tensors.push(tensor);
    }

    fs::create_dir_all(dir)?;

    let mut files = Vec::with_capacity(specs.len());
    for (spec, tensor) in specs.iter().zip(tensors) {
        let path = dir.join(spec.file_name());
        codec::write_verified(&path, tensor.as_slice())?;
        let sha256 = sha256_hex(&codec::encode(tensor.as_slice()));

        info!(file = %spec.file_name(), bytes = spec.num_bytes(), "exported tensor");
        files.push(ManifestEntry {
            contract: ContractEntry::from(spec),
            sha256,
        });
    }

    let manifest = ExportManifest {
        export_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        architecture: descriptor.name().to_string(),
        total_bytes: files.iter().map(|f| f.contract.bytes).sum(),
        files,
    };

    fs::write(dir.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?)?;
    info!(
        dir = %dir.display(),
        files = manifest.files.len(),
        total_bytes = manifest.total_bytes,
        "weight export complete"
    );
    Ok(manifest)
}

/// Write the canonical input tensor, verified by read-back
pub fn export_input(tensor: &Tensor, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let bytes = codec::write_verified(path, tensor.as_slice())?;
    info!(path = %path.display(), bytes, shape = ?tensor.shape(), "exported input tensor");
    Ok(bytes)
}
