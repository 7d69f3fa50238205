//! Shaped float32 buffers and their identifiers
//!
//! Every tensor keeps `data.len() == product(shape)`. The constructor is the
//! only way in, so the invariant holds for every value of the type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MelBridgeError, Result};

/// Row-major float32 tensor with a fixed shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = MelBridgeError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::new(raw.shape, raw.values)
    }
}

/// Number of elements a shape describes
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

impl Tensor {
    /// Create a tensor, checking the buffer length against the shape
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(MelBridgeError::InvalidTensor {
                reason: format!("shape {:?} must have positive dimensions", shape),
            });
        }
        let expected = num_elements(&shape);
        if values.len() != expected {
            return Err(MelBridgeError::InvalidTensor {
                reason: format!(
                    "buffer holds {} values but shape {:?} needs {}",
                    values.len(),
                    shape,
                    expected
                ),
            });
        }
        Ok(Tensor { shape, values })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Minimum and maximum values (NaN-ignoring). `None` when all values are NaN.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Which parameter or activation of a layer a tensor holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    Weights,
    Bias,
    /// Output feature map of a layer
    Activation,
}

impl TensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TensorKind::Weights => "weights",
            TensorKind::Bias => "bias",
            TensorKind::Activation => "activation",
        }
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer name plus tensor kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorId {
    pub layer: String,
    pub kind: TensorKind,
}

impl TensorId {
    pub fn new(layer: impl Into<String>, kind: TensorKind) -> Self {
        TensorId {
            layer: layer.into(),
            kind,
        }
    }

    /// Binary file name for a weight or bias tensor: `<layer>_<kind>.bin`
    pub fn file_name(&self) -> String {
        format!("{}_{}.bin", self.layer, self.kind)
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.layer, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Tensor::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TENSOR");
        assert!(Tensor::new(vec![2, 0], vec![]).is_err());
    }

    #[test]
    fn test_min_max_skips_nan() {
        let tensor = Tensor::new(vec![4], vec![0.5, f32::NAN, -1.0, 2.0]).unwrap();
        assert_eq!(tensor.min_max(), Some((-1.0, 2.0)));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            TensorId::new("conv1_1", TensorKind::Weights).file_name(),
            "conv1_1_weights.bin"
        );
        assert_eq!(TensorId::new("fc2", TensorKind::Bias).file_name(), "fc2_bias.bin");
    }

    #[test]
    fn test_deserialize_checks_invariant() {
        let ok: Tensor = serde_json::from_str(r#"{"shape":[2],"values":[1.0,2.0]}"#).unwrap();
        assert_eq!(ok.shape(), &[2]);

        let bad = serde_json::from_str::<Tensor>(r#"{"shape":[3],"values":[1.0,2.0]}"#);
        assert!(bad.is_err());
    }
}
