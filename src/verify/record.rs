//! Verification records and their aggregation

use std::path::PathBuf;

use crate::error::MelBridgeError;
use crate::tensor::TensorId;

/// Result of checking one tensor file
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Max abs difference below tolerance
    Pass { max_abs_diff: f32 },
    /// Sizes agree but values differ by at least the tolerance
    ValueMismatch { max_abs_diff: f32, tolerance: f32 },
    /// File holds a different number of elements than the shape requires
    SizeMismatch { expected: usize, actual: usize },
    /// Reference tensor shape disagrees with the descriptor
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Candidate file does not exist
    MissingFile,
    /// Reference model has no such tensor
    MissingReference,
    /// File exists but could not be read
    Unreadable { reason: String },
    /// Nothing to compare against (feature map without a reference file)
    Skipped,
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    pub fn is_failure(&self) -> bool {
        !self.is_pass() && !self.is_skipped()
    }

    /// Short machine-friendly label
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Pass { .. } => "pass",
            Outcome::ValueMismatch { .. } => "value_mismatch",
            Outcome::SizeMismatch { .. } => "size_mismatch",
            Outcome::ShapeMismatch { .. } => "shape_mismatch",
            Outcome::MissingFile => "missing_file",
            Outcome::MissingReference => "missing_reference",
            Outcome::Unreadable { .. } => "unreadable",
            Outcome::Skipped => "skipped",
        }
    }
}

/// Outcome of checking one named tensor
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    pub id: TensorId,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// File size, set only when the file was correctly sized
    pub bytes: Option<u64>,
}

impl VerificationRecord {
    pub fn new(id: TensorId, path: PathBuf, outcome: Outcome) -> Self {
        VerificationRecord {
            id,
            path,
            outcome,
            bytes: None,
        }
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// The error this record stands for, if it is a failure
    pub fn error(&self) -> Option<MelBridgeError> {
        let name = self.id.to_string();
        match &self.outcome {
            Outcome::Pass { .. } | Outcome::Skipped => None,
            Outcome::ValueMismatch {
                max_abs_diff,
                tolerance,
            } => Some(MelBridgeError::ValueMismatch {
                name,
                max_abs_diff: *max_abs_diff,
                tolerance: *tolerance,
            }),
            Outcome::SizeMismatch { expected, actual } => Some(MelBridgeError::SizeMismatch {
                name,
                expected: *expected,
                actual: *actual,
            }),
            Outcome::ShapeMismatch { expected, actual } => Some(MelBridgeError::ShapeMismatch {
                name,
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            Outcome::MissingFile => Some(MelBridgeError::MissingFile {
                path: self.path.clone(),
            }),
            Outcome::MissingReference => Some(MelBridgeError::InvalidTensor {
                reason: format!("reference model has no {} tensor", name),
            }),
            Outcome::Unreadable { reason } => Some(MelBridgeError::InvalidTensor {
                reason: format!("{}: {}", self.path.display(), reason),
            }),
        }
    }
}

/// All records of one verification run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationSummary {
    pub records: Vec<VerificationRecord>,
    /// Bytes across all correctly sized files
    pub total_bytes: u64,
    /// `.bin` files in the checked directory that nothing expects
    pub stray_files: Vec<PathBuf>,
}

impl VerificationSummary {
    pub fn from_records(records: Vec<VerificationRecord>) -> Self {
        let total_bytes = records.iter().filter_map(|r| r.bytes).sum();
        VerificationSummary {
            records,
            total_bytes,
            stray_files: Vec::new(),
        }
    }

    pub fn passed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    /// Records that were actually compared (passed + failed)
    pub fn total(&self) -> usize {
        self.records.len() - self.skipped()
    }

    /// The run succeeds when something was compared and every comparison passed
    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.total() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    /// The first failure as an error, for callers that want `?`
    ///
    /// A run that compared nothing has no failing record and still converts
    /// to `Ok`; check [`is_success`](Self::is_success) for the verdict.
    pub fn into_result(self) -> crate::Result<Self> {
        let first = self.failures().find_map(|r| r.error());
        match first {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}
