//! Cross-implementation verifier
//!
//! Compares tensor files written by another implementation against the
//! reference values, one descriptor entry at a time. Every expected tensor
//! produces exactly one record; a failure never stops the run.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::VerifyConfig;
use crate::error::{MelBridgeError, Result};
use crate::model::{ArchitectureDescriptor, PlanEntry, ReferenceModel, TensorSpec};
use crate::tensor::{codec, TensorId};
use crate::verify::record::{Outcome, VerificationRecord, VerificationSummary};

/// Largest absolute element-wise difference
///
/// A NaN on either side counts as an infinite difference, so it can never
/// pass a tolerance check. Slices must have equal length.
pub fn max_abs_diff(reference: &[f32], candidate: &[f32]) -> f32 {
    reference
        .iter()
        .zip(candidate.iter())
        .map(|(a, b)| {
            let diff = (a - b).abs();
            if diff.is_nan() {
                f32::INFINITY
            } else {
                diff
            }
        })
        .fold(0.0, f32::max)
}

/// `.bin` files directly inside `dir` that are not in `expected`
pub fn stray_files(dir: &Path, expected: &[String]) -> Vec<PathBuf> {
    let mut strays: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "bin"))
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            !expected.iter().any(|e| *e == name)
        })
        .map(|entry| entry.into_path())
        .collect();
    strays.sort();
    strays
}

/// Checks candidate tensor files against reference values
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    descriptor: &'a ArchitectureDescriptor,
    config: VerifyConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(descriptor: &'a ArchitectureDescriptor, config: VerifyConfig) -> Self {
        Verifier { descriptor, config }
    }

    /// Compare the file at `path` against `reference`
    ///
    /// Checks run in order: existence, element count, values. The byte count
    /// is attached whenever the size was right, even if values differ.
    pub fn compare_file(
        &self,
        id: TensorId,
        path: &Path,
        reference: &[f32],
        tolerance: f32,
    ) -> VerificationRecord {
        let path_buf = path.to_path_buf();
        if !path.exists() {
            return VerificationRecord::new(id, path_buf, Outcome::MissingFile);
        }

        let candidate = match codec::read_all(path) {
            Ok(values) => values,
            Err(MelBridgeError::TruncatedFile { actual_bytes, .. }) => {
                // partial trailing element: report the whole elements present
                let actual = actual_bytes as usize / codec::ELEMENT_SIZE;
                let outcome = Outcome::SizeMismatch {
                    expected: reference.len(),
                    actual,
                };
                return VerificationRecord::new(id, path_buf, outcome);
            }
            Err(MelBridgeError::MissingFile { .. }) => {
                return VerificationRecord::new(id, path_buf, Outcome::MissingFile);
            }
            Err(e) => {
                let outcome = Outcome::Unreadable {
                    reason: e.to_string(),
                };
                return VerificationRecord::new(id, path_buf, outcome);
            }
        };

        if candidate.len() != reference.len() {
            let outcome = Outcome::SizeMismatch {
                expected: reference.len(),
                actual: candidate.len(),
            };
            return VerificationRecord::new(id, path_buf, outcome);
        }

        let diff = max_abs_diff(reference, &candidate);
        let outcome = if diff < tolerance {
            Outcome::Pass { max_abs_diff: diff }
        } else {
            Outcome::ValueMismatch {
                max_abs_diff: diff,
                tolerance,
            }
        };
        let bytes = (candidate.len() * codec::ELEMENT_SIZE) as u64;
        VerificationRecord::new(id, path_buf, outcome).with_bytes(bytes)
    }

    /// Check one descriptor weight/bias file against the reference model
    pub fn check_tensor(
        &self,
        model: &dyn ReferenceModel,
        spec: &TensorSpec,
        dir: &Path,
    ) -> VerificationRecord {
        let path = dir.join(spec.file_name());

        let reference = match model.tensor(&spec.id.layer, spec.id.kind) {
            Some(tensor) => tensor,
            None => {
                if !path.exists() {
                    return VerificationRecord::new(spec.id.clone(), path, Outcome::MissingFile);
                }
                return VerificationRecord::new(spec.id.clone(), path, Outcome::MissingReference);
            }
        };

        if reference.shape() != spec.shape {
            let outcome = Outcome::ShapeMismatch {
                expected: spec.shape.to_vec(),
                actual: reference.shape().to_vec(),
            };
            return VerificationRecord::new(spec.id.clone(), path, outcome);
        }

        self.compare_file(
            spec.id.clone(),
            &path,
            reference.as_slice(),
            self.config.weight_tolerance,
        )
    }

    /// Verify every weight and bias file in `dir` against `model`
    pub fn verify_weights(&self, model: &dyn ReferenceModel, dir: &Path) -> VerificationSummary {
        info!(
            dir = %dir.display(),
            architecture = self.descriptor.name(),
            tolerance = self.config.weight_tolerance,
            "verifying weight files"
        );

        let records: Vec<VerificationRecord> = self
            .descriptor
            .tensor_specs()
            .map(|spec| {
                let record = self.check_tensor(model, &spec, dir);
                log_record(&record);
                record
            })
            .collect();

        let mut summary = VerificationSummary::from_records(records);
        summary.stray_files = stray_files(dir, &self.descriptor.file_names());
        for stray in &summary.stray_files {
            warn!(path = %stray.display(), "unexpected tensor file");
        }

        info!(
            passed = summary.passed(),
            total = summary.total(),
            total_bytes = summary.total_bytes,
            "weight verification finished"
        );
        summary
    }

    /// Check one layer's feature map; `Skipped` when there is no reference file
    pub fn check_feature_map(
        &self,
        entry: &PlanEntry,
        reference_dir: &Path,
        candidate_dir: &Path,
    ) -> VerificationRecord {
        let file = entry.output_file_name();
        let reference_path = reference_dir.join(&file);
        let candidate_path = candidate_dir.join(&file);

        if !reference_path.exists() {
            return VerificationRecord::new(entry.tensor_id(), candidate_path, Outcome::Skipped);
        }

        let reference = match codec::read_tensor(&reference_path, entry.output_elements()) {
            Ok(values) => values,
            Err(e) => {
                let outcome = Outcome::Unreadable {
                    reason: format!("reference: {}", e),
                };
                return VerificationRecord::new(entry.tensor_id(), reference_path, outcome);
            }
        };

        self.compare_file(
            entry.tensor_id(),
            &candidate_path,
            &reference,
            self.config.feature_map_tolerance,
        )
    }

    /// Compare per-layer feature maps of two forward passes
    ///
    /// The reference directory must exist. A run that finds no reference
    /// file at all compares nothing and is not a success.
    pub fn verify_feature_maps(
        &self,
        reference_dir: &Path,
        candidate_dir: &Path,
    ) -> Result<VerificationSummary> {
        if !reference_dir.is_dir() {
            return Err(MelBridgeError::MissingFile {
                path: reference_dir.to_path_buf(),
            });
        }

        info!(
            reference = %reference_dir.display(),
            candidate = %candidate_dir.display(),
            tolerance = self.config.feature_map_tolerance,
            "verifying feature maps"
        );

        let records: Vec<VerificationRecord> = self
            .descriptor
            .plan()
            .iter()
            .map(|entry| {
                let record = self.check_feature_map(entry, reference_dir, candidate_dir);
                log_record(&record);
                record
            })
            .collect();

        let summary = VerificationSummary::from_records(records);
        info!(
            passed = summary.passed(),
            total = summary.total(),
            skipped = summary.skipped(),
            "feature map verification finished"
        );
        if summary.total() == 0 {
            warn!(reference = %reference_dir.display(), "no reference feature maps found");
        }
        Ok(summary)
    }
}

fn log_record(record: &VerificationRecord) {
    match &record.outcome {
        Outcome::Pass { max_abs_diff } => {
            debug!(tensor = %record.id, max_abs_diff, "pass");
        }
        Outcome::Skipped => {
            debug!(tensor = %record.id, "no reference, skipped");
        }
        outcome => {
            warn!(tensor = %record.id, path = %record.path.display(), outcome = ?outcome, "verification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoredModel;
    use crate::tensor::TensorKind;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    fn conv2_1_spec() -> TensorSpec {
        ArchitectureDescriptor::audio_cnn()
            .tensor_specs()
            .find(|s| s.id == TensorId::new("conv2_1", TensorKind::Weights))
            .unwrap()
    }

    fn pattern(i: usize) -> f32 {
        (i % 97) as f32 * 0.01 - 0.3
    }

    #[test]
    fn test_max_abs_diff() {
        assert_eq!(max_abs_diff(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_relative_eq!(max_abs_diff(&[1.0, 2.0], &[1.5, 1.0]), 1.0);
        assert_eq!(max_abs_diff(&[1.0], &[f32::NAN]), f32::INFINITY);
        assert_eq!(max_abs_diff(&[f32::INFINITY], &[f32::INFINITY]), f32::INFINITY);
    }

    #[test]
    fn test_identical_file_passes() {
        let dir = tempdir().unwrap();
        let spec = conv2_1_spec();
        let reference: Vec<f32> = (0..spec.num_elements()).map(pattern).collect();
        assert_eq!(reference.len(), 18_432);

        let path = dir.path().join(spec.file_name());
        codec::write_tensor(&path, &reference).unwrap();

        let verifier = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default());
        let record = verifier.compare_file(spec.id.clone(), &path, &reference, 1e-6);
        assert_eq!(record.outcome, Outcome::Pass { max_abs_diff: 0.0 });
        assert_eq!(record.bytes, Some(73_728));
    }

    #[test]
    fn test_short_file_is_size_mismatch() {
        let dir = tempdir().unwrap();
        let spec = conv2_1_spec();
        let reference: Vec<f32> = (0..spec.num_elements()).map(pattern).collect();

        let path = dir.path().join(spec.file_name());
        codec::write_tensor(&path, &reference[..6000]).unwrap();

        let verifier = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default());
        let record = verifier.compare_file(spec.id.clone(), &path, &reference, 1e-6);
        assert_eq!(
            record.outcome,
            Outcome::SizeMismatch {
                expected: 18_432,
                actual: 6000
            }
        );
        assert_eq!(record.bytes, None);
    }

    #[test]
    fn test_perturbed_value_is_value_mismatch() {
        let dir = tempdir().unwrap();
        let spec = conv2_1_spec();
        let reference: Vec<f32> = (0..spec.num_elements()).map(pattern).collect();
        let mut candidate = reference.clone();
        candidate[1234] += 1e-3;

        let path = dir.path().join(spec.file_name());
        codec::write_tensor(&path, &candidate).unwrap();

        let verifier = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default());
        let record = verifier.compare_file(spec.id.clone(), &path, &reference, 1e-6);
        match record.outcome {
            Outcome::ValueMismatch { max_abs_diff, .. } => {
                assert_relative_eq!(max_abs_diff, 1e-3, max_relative = 1e-2);
            }
            other => panic!("Expected ValueMismatch, got: {:?}", other),
        }
        assert_eq!(record.bytes, Some(73_728));
    }

    #[test]
    fn test_partial_element_is_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fc2_bias.bin");
        fs::write(&path, [0u8; 10]).unwrap();

        let verifier = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default());
        let id = TensorId::new("fc2", TensorKind::Bias);
        let record = verifier.compare_file(id, &path, &[0.0; 10], 1e-6);
        assert_eq!(
            record.outcome,
            Outcome::SizeMismatch {
                expected: 10,
                actual: 2
            }
        );
    }

    #[test]
    fn test_empty_dir_reports_every_file_missing() {
        let dir = tempdir().unwrap();
        let descriptor = ArchitectureDescriptor::audio_cnn();
        let model = StoredModel::synthetic(descriptor, |_, _, _| 0.0).unwrap();

        let summary = Verifier::new(descriptor, VerifyConfig::default())
            .verify_weights(&model, dir.path());
        assert_eq!(summary.records.len(), 16);
        assert_eq!(summary.passed(), 0);
        assert!(summary
            .records
            .iter()
            .all(|r| r.outcome == Outcome::MissingFile));
        assert_eq!(summary.total_bytes, 0);
    }

    #[test]
    fn test_stray_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("fc2_bias.bin"), [0u8; 40]).unwrap();
        fs::write(dir.path().join("fc3_bias.bin"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let strays = stray_files(dir.path(), &["fc2_bias.bin".to_string()]);
        assert_eq!(strays, vec![dir.path().join("fc3_bias.bin")]);
    }

    #[test]
    fn test_feature_map_without_reference_is_skipped() {
        let reference = tempdir().unwrap();
        let candidate = tempdir().unwrap();
        let descriptor = ArchitectureDescriptor::audio_cnn();
        let softmax = &descriptor.plan()[12];

        codec::write_tensor(&reference.path().join(softmax.output_file_name()), &[0.1; 10]).unwrap();
        codec::write_tensor(&candidate.path().join(softmax.output_file_name()), &[0.1; 10]).unwrap();

        let summary = Verifier::new(descriptor, VerifyConfig::default())
            .verify_feature_maps(reference.path(), candidate.path())
            .unwrap();
        assert_eq!(summary.records.len(), 13);
        assert_eq!(summary.skipped(), 12);
        assert_eq!(summary.passed(), 1);
        assert!(summary.is_success());
    }

    #[test]
    fn test_feature_maps_require_reference_dir() {
        let candidate = tempdir().unwrap();
        let missing = candidate.path().join("no_such_reference");

        let err = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default())
            .verify_feature_maps(&missing, candidate.path())
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_FILE");
    }

    #[test]
    fn test_feature_maps_with_no_references_fail() {
        let reference = tempdir().unwrap();
        let candidate = tempdir().unwrap();

        let summary = Verifier::new(ArchitectureDescriptor::audio_cnn(), VerifyConfig::default())
            .verify_feature_maps(reference.path(), candidate.path())
            .unwrap();
        assert_eq!(summary.skipped(), 13);
        assert_eq!(summary.total(), 0);
        assert!(!summary.is_success());
    }
}
