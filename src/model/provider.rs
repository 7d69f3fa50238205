//! Reference model providers
//!
//! The trained model lives in another framework. All this crate needs from it
//! is the per-layer weights and biases, enumerated in a stable order, as
//! fixed-shape float32 buffers. [`ReferenceModel`] is that seam.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MelBridgeError, Result};
use crate::model::architecture::ArchitectureDescriptor;
use crate::tensor::{codec, Tensor, TensorKind};

/// Parameters of one trained layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub name: String,
    pub weights: Tensor,
    #[serde(default)]
    pub bias: Option<Tensor>,
}

impl LayerWeights {
    pub fn tensor(&self, kind: TensorKind) -> Option<&Tensor> {
        match kind {
            TensorKind::Weights => Some(&self.weights),
            TensorKind::Bias => self.bias.as_ref(),
            TensorKind::Activation => None,
        }
    }
}

/// Source of reference weights for export and verification
pub trait ReferenceModel {
    /// Layers with parameters, in model order
    fn layers(&self) -> &[LayerWeights];

    fn layer(&self, name: &str) -> Option<&LayerWeights> {
        self.layers().iter().find(|layer| layer.name == name)
    }

    fn tensor(&self, layer: &str, kind: TensorKind) -> Option<&Tensor> {
        self.layer(layer).and_then(|l| l.tensor(kind))
    }
}

/// Reference weights held in memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub layers: Vec<LayerWeights>,
}

impl StoredModel {
    pub fn new(layers: Vec<LayerWeights>) -> Self {
        StoredModel { layers }
    }

    /// Load a JSON dump: `{"layers": [{"name", "weights": {"shape", "values"}, "bias"}]}`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MelBridgeError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        let model: StoredModel = serde_json::from_str(&content)?;
        info!(path = %path.display(), layers = model.layers.len(), "loaded reference model");
        Ok(model)
    }

    /// Load every descriptor tensor from a directory of binary files
    ///
    /// Used when the reference side has already exported its weights and a
    /// second export is to be checked against it. Reads are strict: a file
    /// of the wrong size fails the whole load.
    pub fn from_bin_dir(dir: &Path, descriptor: &ArchitectureDescriptor) -> Result<Self> {
        let mut layers = Vec::with_capacity(descriptor.entries().len());

        for entry in descriptor.entries() {
            let load = |kind: TensorKind, shape: &[usize]| -> Result<Tensor> {
                let path = dir.join(format!("{}_{}.bin", entry.name, kind));
                let values = codec::read_tensor(&path, crate::tensor::num_elements(shape))?;
                debug!(path = %path.display(), "loaded reference tensor");
                Tensor::new(shape.to_vec(), values)
            };

            layers.push(LayerWeights {
                name: entry.name.to_string(),
                weights: load(TensorKind::Weights, entry.weight_shape)?,
                bias: Some(load(TensorKind::Bias, entry.bias_shape)?),
            });
        }

        info!(dir = %dir.display(), layers = layers.len(), "loaded reference model from binary files");
        Ok(StoredModel { layers })
    }

    /// Model whose tensors match the descriptor's shapes, filled by `value_at`
    ///
    /// `value_at` receives the tensor id and flat index. Handy for synthetic
    /// fixtures; the values carry no meaning.
    pub fn synthetic<F>(descriptor: &ArchitectureDescriptor, mut value_at: F) -> Result<Self>
    where
        F: FnMut(&str, TensorKind, usize) -> f32,
    {
        let mut layers = Vec::with_capacity(descriptor.entries().len());
        for entry in descriptor.entries() {
            let mut build = |kind: TensorKind, shape: &[usize]| {
                let len = crate::tensor::num_elements(shape);
                let values = (0..len).map(|i| value_at(entry.name, kind, i)).collect();
                Tensor::new(shape.to_vec(), values)
            };
            let weights = build(TensorKind::Weights, entry.weight_shape)?;
            let bias = build(TensorKind::Bias, entry.bias_shape)?;
            layers.push(LayerWeights {
                name: entry.name.to_string(),
                weights,
                bias: Some(bias),
            });
        }
        Ok(StoredModel { layers })
    }
}

impl ReferenceModel for StoredModel {
    fn layers(&self) -> &[LayerWeights] {
        &self.layers
    }
}
