//! Canonical mono waveform
//!
//! The loader produces one of these at a fixed sample rate and a fixed
//! length; the feature extractor consumes it.

/// Mono 32-bit float audio at a known sample rate
///
/// # Example
/// ```
/// use melbridge::engine::Waveform;
///
/// let wave = Waveform::silence(22050, 22050);
/// assert_eq!(wave.len(), 22050);
/// assert_eq!(wave.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Sample data
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create a waveform of `num_samples` zeros
    pub fn silence(num_samples: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; num_samples], sample_rate)
    }

    /// Get the number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Force the waveform to exactly `target_len` samples.
    ///
    /// Shorter audio is zero-padded at the end, longer audio is truncated.
    /// The signal is never stretched in time.
    pub fn fit_to_length(&mut self, target_len: usize) {
        self.samples.resize(target_len, 0.0);
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_pads_with_zeros() {
        let mut wave = Waveform::new(vec![0.5, -0.5, 0.25], 22050);
        wave.fit_to_length(6);
        assert_eq!(wave.samples, vec![0.5, -0.5, 0.25, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_fit_truncates_tail() {
        let mut wave = Waveform::new(vec![1.0, 2.0, 3.0, 4.0], 22050);
        wave.fit_to_length(2);
        assert_eq!(wave.samples, vec![1.0, 2.0]);
        assert_eq!(wave.sample_rate, 22050);
    }

    #[test]
    fn test_is_finite() {
        assert!(Waveform::silence(10, 22050).is_finite());
        assert!(!Waveform::new(vec![0.0, f32::NAN], 22050).is_finite());
        assert!(!Waveform::new(vec![f32::INFINITY], 22050).is_finite());
    }
}
