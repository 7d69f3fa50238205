//! Waveform to normalized spectrogram tensor
//!
//! Steps, each feeding the next:
//! 1. power mel-spectrogram ([`MelAnalyzer`])
//! 2. power to dB, referenced to the array maximum
//! 3. min-max normalization to [0, 1]
//! 4. bilinear resize to the target (rows, cols) when the shapes differ
//! 5. trailing channel dimension of size 1

use tracing::{debug, warn};

use crate::config::{NormalizationPolicy, PipelineConfig};
use crate::engine::Waveform;
use crate::error::{MelBridgeError, Result};
use crate::features::mel::{MelAnalyzer, MelSpectrogram};
use crate::tensor::Tensor;

/// Floor applied to power values before taking the logarithm
pub const AMIN: f64 = 1e-10;

/// Convert power to decibels relative to the array's own maximum
///
/// `db = 10*log10(max(amin, S)) - 10*log10(max(amin, max(S)))`, so the peak
/// maps to 0 dB and everything else is negative. With `top_db` set, values
/// are floored at `max(db) - top_db`.
pub fn power_to_db(power: &[f64], top_db: Option<f64>) -> Vec<f64> {
    let reference = power.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ref_db = 10.0 * reference.max(AMIN).log10();

    let mut db: Vec<f64> = power
        .iter()
        .map(|&p| 10.0 * p.max(AMIN).log10() - ref_db)
        .collect();

    if let Some(top_db) = top_db {
        let peak = db.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let floor = peak - top_db;
        for v in db.iter_mut() {
            *v = v.max(floor);
        }
    }

    db
}

/// Scale values linearly onto [0, 1]
///
/// When every value is equal the range is zero: `ZeroFill` yields all zeros,
/// `Reject` fails with `DegenerateNormalization`.
pub fn min_max_normalize(values: &[f64], policy: NormalizationPolicy) -> Result<Vec<f64>> {
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;

    if !(range > 0.0) {
        return match policy {
            NormalizationPolicy::ZeroFill => {
                warn!(value = lo, "spectrogram has zero dB range, emitting zeros");
                Ok(vec![0.0; values.len()])
            }
            NormalizationPolicy::Reject => Err(MelBridgeError::DegenerateNormalization {
                value: lo as f32,
            }),
        };
    }

    Ok(values.iter().map(|&v| (v - lo) / range).collect())
}

/// Source coordinate of output index `o` when `in_len` samples are stretched
/// onto `out_len` with both endpoints aligned
fn source_coordinate(o: usize, in_len: usize, out_len: usize) -> f64 {
    if out_len <= 1 || in_len <= 1 {
        return 0.0;
    }
    o as f64 * (in_len - 1) as f64 / (out_len - 1) as f64
}

fn lerp_indices(pos: f64, len: usize) -> (usize, usize, f64) {
    let i0 = (pos.floor() as usize).min(len - 1);
    let i1 = (i0 + 1).min(len - 1);
    (i0, i1, pos - i0 as f64)
}

/// Order-1 (bilinear) resize of a row-major 2-D array
///
/// Output values are convex combinations of inputs; nothing is clamped.
pub fn resize_bilinear(
    data: &[f64],
    rows: usize,
    cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(out_rows * out_cols);

    for r in 0..out_rows {
        let (r0, r1, fr) = lerp_indices(source_coordinate(r, rows, out_rows), rows);
        for c in 0..out_cols {
            let (c0, c1, fc) = lerp_indices(source_coordinate(c, cols, out_cols), cols);

            let top = data[r0 * cols + c0] * (1.0 - fc) + data[r0 * cols + c1] * fc;
            let bottom = data[r1 * cols + c0] * (1.0 - fc) + data[r1 * cols + c1] * fc;
            out.push(top * (1.0 - fr) + bottom * fr);
        }
    }

    out
}

/// Turns canonical waveforms into `(rows, cols, 1)` spectrogram tensors
#[derive(Debug)]
pub struct FeatureExtractor {
    config: PipelineConfig,
    analyzer: MelAnalyzer,
}

impl FeatureExtractor {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = MelAnalyzer::new(&config);
        Ok(FeatureExtractor { config, analyzer })
    }

    /// Power mel-spectrogram only (step 1)
    pub fn mel_power(&self, waveform: &Waveform) -> Result<MelSpectrogram> {
        if waveform.sample_rate != self.config.sample_rate {
            return Err(MelBridgeError::InvalidConfig {
                reason: format!(
                    "waveform is at {} Hz but the extractor expects {} Hz",
                    waveform.sample_rate, self.config.sample_rate
                ),
            });
        }
        Ok(self.analyzer.compute(waveform.as_slice()))
    }

    /// Run the full pipeline and return the normalized tensor
    pub fn extract(&self, waveform: &Waveform) -> Result<Tensor> {
        let mel = self.mel_power(waveform)?;
        let db = power_to_db(&mel.data, self.config.top_db);
        let normalized = min_max_normalize(&db, self.config.normalization)?;

        let target = self.config.target_shape;
        let resized = if (mel.n_mels, mel.n_frames) != (target.rows, target.cols) {
            debug!(
                from_rows = mel.n_mels,
                from_cols = mel.n_frames,
                to_rows = target.rows,
                to_cols = target.cols,
                "resizing spectrogram"
            );
            resize_bilinear(&normalized, mel.n_mels, mel.n_frames, target.rows, target.cols)
        } else {
            normalized
        };

        let values: Vec<f32> = resized.into_iter().map(|v| v as f32).collect();
        Tensor::new(target.dims(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_power_to_db_references_max() {
        let db = power_to_db(&[1.0, 0.1, 0.01, 0.0], None);
        assert_relative_eq!(db[0], 0.0);
        assert_relative_eq!(db[1], -10.0, epsilon = 1e-9);
        assert_relative_eq!(db[2], -20.0, epsilon = 1e-9);
        // zero power is floored at amin
        assert_relative_eq!(db[3], -100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_power_to_db_top_db_floor() {
        let db = power_to_db(&[1.0, 1e-12], Some(80.0));
        assert_eq!(db[1], -80.0);
    }

    #[test]
    fn test_normalize_spans_unit_interval() {
        let norm = min_max_normalize(&[-80.0, -40.0, 0.0], NormalizationPolicy::ZeroFill).unwrap();
        assert_eq!(norm, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_normalize_degenerate_policies() {
        let flat = [0.0; 4];
        assert_eq!(
            min_max_normalize(&flat, NormalizationPolicy::ZeroFill).unwrap(),
            vec![0.0; 4]
        );

        let err = min_max_normalize(&flat, NormalizationPolicy::Reject).unwrap_err();
        assert_eq!(err.error_code(), "DEGENERATE_NORMALIZATION");
    }

    #[test]
    fn test_resize_identity() {
        let data: Vec<f64> = (0..12).map(|v| v as f64).collect();
        assert_eq!(resize_bilinear(&data, 3, 4, 3, 4), data);
    }

    #[test]
    fn test_resize_aligns_endpoints() {
        // One row [0, 10, 20] stretched to five columns
        let out = resize_bilinear(&[0.0, 10.0, 20.0], 1, 3, 1, 5);
        assert_eq!(out, vec![0.0, 5.0, 10.0, 15.0, 20.0]);

        // And squeezed to two
        let out = resize_bilinear(&[0.0, 10.0, 20.0], 1, 3, 1, 2);
        assert_eq!(out, vec![0.0, 20.0]);
    }

    #[test]
    fn test_rejects_wrong_sample_rate() {
        let extractor = FeatureExtractor::new(PipelineConfig::default()).unwrap();
        let err = extractor.extract(&Waveform::silence(1000, 44100)).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
