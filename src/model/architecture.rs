//! Architecture descriptor for the instrument classifier
//!
//! The tables below were generated from the trained model's layer shapes.
//! They are fixed data: if the architecture changes, regenerate them from the
//! model rather than editing shapes by hand.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::tensor::{num_elements, TensorId, TensorKind};

// ============================================================================
// Parameter descriptor
// ============================================================================

/// Weight and bias shapes of one parameterized layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerEntry {
    pub name: &'static str,
    pub weight_shape: &'static [usize],
    pub bias_shape: &'static [usize],
}

/// One weight or bias tensor the descriptor expects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub id: TensorId,
    pub shape: &'static [usize],
}

impl TensorSpec {
    pub fn num_elements(&self) -> usize {
        num_elements(self.shape)
    }

    pub fn num_bytes(&self) -> u64 {
        self.num_elements() as u64 * 4
    }

    pub fn file_name(&self) -> String {
        self.id.file_name()
    }
}

const AUDIO_CNN_LAYERS: &[LayerEntry] = &[
    LayerEntry { name: "conv1_1", weight_shape: &[5, 5, 1, 32], bias_shape: &[32] },
    LayerEntry { name: "conv1_2", weight_shape: &[5, 5, 32, 32], bias_shape: &[32] },
    LayerEntry { name: "conv2_1", weight_shape: &[3, 3, 32, 64], bias_shape: &[64] },
    LayerEntry { name: "conv2_2", weight_shape: &[3, 3, 64, 64], bias_shape: &[64] },
    LayerEntry { name: "conv3_1", weight_shape: &[3, 3, 64, 64], bias_shape: &[64] },
    LayerEntry { name: "conv3_2", weight_shape: &[3, 3, 64, 128], bias_shape: &[128] },
    LayerEntry { name: "fc1", weight_shape: &[18432, 256], bias_shape: &[256] },
    LayerEntry { name: "fc2", weight_shape: &[256, 10], bias_shape: &[10] },
];

static AUDIO_CNN: ArchitectureDescriptor = ArchitectureDescriptor {
    name: "audio_cnn_irmas",
    layers: AUDIO_CNN_LAYERS,
    plan: AUDIO_CNN_PLAN,
};

/// Immutable, ordered table of a network's parameter and activation shapes
#[derive(Debug, PartialEq, Eq)]
pub struct ArchitectureDescriptor {
    name: &'static str,
    layers: &'static [LayerEntry],
    plan: &'static [PlanEntry],
}

impl ArchitectureDescriptor {
    /// The 10-class instrument classifier this crate targets
    pub fn audio_cnn() -> &'static ArchitectureDescriptor {
        &AUDIO_CNN
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parameterized layers in model order
    pub fn entries(&self) -> &'static [LayerEntry] {
        self.layers
    }

    pub fn get(&self, name: &str) -> Option<&'static LayerEntry> {
        self.layers.iter().find(|entry| entry.name == name)
    }

    /// Every weight and bias tensor, weights before bias within a layer
    pub fn tensor_specs(&self) -> impl Iterator<Item = TensorSpec> + '_ {
        self.layers.iter().flat_map(|entry| {
            [
                TensorSpec {
                    id: TensorId::new(entry.name, TensorKind::Weights),
                    shape: entry.weight_shape,
                },
                TensorSpec {
                    id: TensorId::new(entry.name, TensorKind::Bias),
                    shape: entry.bias_shape,
                },
            ]
        })
    }

    /// Every expected weight/bias file name
    pub fn file_names(&self) -> Vec<String> {
        self.tensor_specs().map(|spec| spec.file_name()).collect()
    }

    pub fn total_elements(&self) -> usize {
        self.tensor_specs().map(|spec| spec.num_elements()).sum()
    }

    /// Bytes across all weight and bias files
    pub fn total_bytes(&self) -> u64 {
        self.tensor_specs().map(|spec| spec.num_bytes()).sum()
    }

    /// Forward-order layer plan (including parameter-free layers)
    pub fn plan(&self) -> &'static [PlanEntry] {
        self.plan
    }

    /// Shape of the tensor the first layer consumes
    pub fn input_shape(&self) -> &'static [usize] {
        self.plan.first().map(|entry| entry.input_shape).unwrap_or(&[])
    }

    /// Number of classes the last layer produces
    pub fn num_classes(&self) -> usize {
        self.plan
            .last()
            .map(|entry| num_elements(entry.output_shape))
            .unwrap_or(0)
    }
}

// ============================================================================
// Forward layer plan
// ============================================================================

/// Operation a plan entry performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    /// Valid-padding 2-D convolution with ReLU
    Conv2d,
    /// 2x2 max pooling, stride 2
    MaxPool2d,
    Flatten,
    Dense,
    Softmax,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Conv2d => "Conv2d",
            LayerKind::MaxPool2d => "MaxPool2d",
            LayerKind::Flatten => "Flatten",
            LayerKind::Dense => "Dense",
            LayerKind::Softmax => "Softmax",
        };
        f.write_str(name)
    }
}

/// One layer of the forward pass with its activation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntry {
    pub index: usize,
    pub name: &'static str,
    pub kind: LayerKind,
    pub input_shape: &'static [usize],
    pub output_shape: &'static [usize],
}

impl PlanEntry {
    /// Feature-map file written for this layer: `layer_<index>_output.bin`
    pub fn output_file_name(&self) -> String {
        format!("layer_{}_output.bin", self.index)
    }

    pub fn output_elements(&self) -> usize {
        num_elements(self.output_shape)
    }

    pub fn tensor_id(&self) -> TensorId {
        TensorId::new(self.name, TensorKind::Activation)
    }
}

const AUDIO_CNN_PLAN: &[PlanEntry] = &[
    PlanEntry { index: 0, name: "conv1_1", kind: LayerKind::Conv2d, input_shape: &[128, 128, 1], output_shape: &[124, 124, 32] },
    PlanEntry { index: 1, name: "conv1_2", kind: LayerKind::Conv2d, input_shape: &[124, 124, 32], output_shape: &[120, 120, 32] },
    PlanEntry { index: 2, name: "pool1", kind: LayerKind::MaxPool2d, input_shape: &[120, 120, 32], output_shape: &[60, 60, 32] },
    PlanEntry { index: 3, name: "conv2_1", kind: LayerKind::Conv2d, input_shape: &[60, 60, 32], output_shape: &[58, 58, 64] },
    PlanEntry { index: 4, name: "conv2_2", kind: LayerKind::Conv2d, input_shape: &[58, 58, 64], output_shape: &[56, 56, 64] },
    PlanEntry { index: 5, name: "pool2", kind: LayerKind::MaxPool2d, input_shape: &[56, 56, 64], output_shape: &[28, 28, 64] },
    PlanEntry { index: 6, name: "conv3_1", kind: LayerKind::Conv2d, input_shape: &[28, 28, 64], output_shape: &[26, 26, 64] },
    PlanEntry { index: 7, name: "conv3_2", kind: LayerKind::Conv2d, input_shape: &[26, 26, 64], output_shape: &[24, 24, 128] },
    PlanEntry { index: 8, name: "pool3", kind: LayerKind::MaxPool2d, input_shape: &[24, 24, 128], output_shape: &[12, 12, 128] },
    PlanEntry { index: 9, name: "flatten", kind: LayerKind::Flatten, input_shape: &[12, 12, 128], output_shape: &[18432] },
    PlanEntry { index: 10, name: "fc1", kind: LayerKind::Dense, input_shape: &[18432], output_shape: &[256] },
    PlanEntry { index: 11, name: "fc2", kind: LayerKind::Dense, input_shape: &[256], output_shape: &[10] },
    PlanEntry { index: 12, name: "softmax", kind: LayerKind::Softmax, input_shape: &[10], output_shape: &[10] },
];

// ============================================================================
// Loading contract
// ============================================================================

/// One file a consumer implementation must load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractEntry {
    pub file: String,
    pub layer: String,
    pub kind: TensorKind,
    pub shape: Vec<usize>,
    pub elements: usize,
    pub bytes: u64,
}

impl From<&TensorSpec> for ContractEntry {
    fn from(spec: &TensorSpec) -> Self {
        ContractEntry {
            file: spec.file_name(),
            layer: spec.id.layer.clone(),
            kind: spec.id.kind,
            shape: spec.shape.to_vec(),
            elements: spec.num_elements(),
            bytes: spec.num_bytes(),
        }
    }
}

/// Layout and audio parameters of the canonical input tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub shape: Vec<usize>,
    pub dtype: String,
    pub layout: String,
    pub value_range: (f32, f32),
    pub bytes: u64,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
}

impl From<&PipelineConfig> for InputSpec {
    fn from(config: &PipelineConfig) -> Self {
        let shape = config.target_shape;
        InputSpec {
            shape: shape.dims(),
            dtype: "float32".to_string(),
            layout: format!(
                "row-major [row][col][channel]; index = (row * {} + col) * {} + channel",
                shape.cols, shape.channels
            ),
            value_range: (0.0, 1.0),
            bytes: shape.num_bytes(),
            sample_rate: config.sample_rate,
            duration_secs: config.duration_secs,
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
        }
    }
}

/// Everything a consumer needs to load weights and input bit-compatibly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingContract {
    pub architecture: String,
    pub byte_order: String,
    pub input: InputSpec,
    pub files: Vec<ContractEntry>,
    pub total_elements: usize,
    pub total_bytes: u64,
}

impl LoadingContract {
    pub fn new(descriptor: &ArchitectureDescriptor, config: &PipelineConfig) -> Self {
        let files: Vec<ContractEntry> = descriptor
            .tensor_specs()
            .map(|spec| ContractEntry::from(&spec))
            .collect();
        LoadingContract {
            architecture: descriptor.name().to_string(),
            byte_order: native_byte_order().to_string(),
            input: InputSpec::from(config),
            total_elements: descriptor.total_elements(),
            total_bytes: files.iter().map(|f| f.bytes).sum(),
            files,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Name of the byte order tensor files are written in on this machine
pub fn native_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "little-endian"
    } else {
        "big-endian"
    }
}
