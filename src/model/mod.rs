//! Model Module
//!
//! What this crate knows about the classifier:
//! - Architecture descriptor, layer plan and loading contract
//! - Reference model providers
//! - Weight/input export
//! - Output class labels

pub mod architecture;
pub mod export;
pub mod labels;
pub mod provider;

pub use architecture::{
    ArchitectureDescriptor, ContractEntry, InputSpec, LayerEntry, LayerKind, LoadingContract,
    PlanEntry, TensorSpec,
};
pub use export::{export_input, export_weights, ExportManifest, ManifestEntry, MANIFEST_FILE};
pub use labels::{top_k, Instrument, Prediction};
pub use provider::{LayerWeights, ReferenceModel, StoredModel};
