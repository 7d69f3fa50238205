//! Power mel-spectrogram
//!
//! Matches the usual reference semantics:
//! - centered frames (signal padded by `n_fft / 2` on both sides)
//! - periodic Hann window
//! - power spectrum `|X|^2`
//! - Slaney mel scale with Slaney area normalization
//!
//! All arithmetic is done in f64; the extractor narrows to f32 at the end.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::{PadMode, PipelineConfig};

const MIN_LOG_HZ: f64 = 1000.0;
const F_SP: f64 = 200.0 / 3.0;

fn min_log_mel() -> f64 {
    MIN_LOG_HZ / F_SP
}

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// Hz to mel, Slaney scale (linear below 1 kHz, logarithmic above)
pub fn hz_to_mel(freq: f64) -> f64 {
    if freq >= MIN_LOG_HZ {
        min_log_mel() + (freq / MIN_LOG_HZ).ln() / log_step()
    } else {
        freq / F_SP
    }
}

/// Mel to Hz, Slaney scale
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= min_log_mel() {
        MIN_LOG_HZ * (log_step() * (mel - min_log_mel())).exp()
    } else {
        F_SP * mel
    }
}

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

/// Triangular mel filters, `n_mels` rows of `n_fft / 2 + 1` weights
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    weights: Vec<f64>,
    n_mels: usize,
    n_bins: usize,
}

impl MelFilterBank {
    /// Build a Slaney-normalized filter bank spanning `[fmin, fmax]`
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: f64) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..n_bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let mut weights = vec![0.0; n_mels * n_bins];
        for m in 0..n_mels {
            let lower_width = edges[m + 1] - edges[m];
            let upper_width = edges[m + 2] - edges[m + 1];
            let enorm = 2.0 / (edges[m + 2] - edges[m]);

            let row = &mut weights[m * n_bins..(m + 1) * n_bins];
            for (w, &freq) in row.iter_mut().zip(fft_freqs.iter()) {
                let lower = (freq - edges[m]) / lower_width;
                let upper = (edges[m + 2] - freq) / upper_width;
                *w = lower.min(upper).max(0.0) * enorm;
            }
        }

        MelFilterBank {
            weights,
            n_mels,
            n_bins,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.n_mels
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Weights of one mel band
    pub fn band(&self, m: usize) -> &[f64] {
        &self.weights[m * self.n_bins..(m + 1) * self.n_bins]
    }
}

/// 2-D mel power array, row-major `[mel][frame]`
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    pub data: Vec<f64>,
    pub n_mels: usize,
    pub n_frames: usize,
}

/// Reusable STFT + mel projection for one configuration
pub struct MelAnalyzer {
    n_fft: usize,
    hop_length: usize,
    pad_mode: PadMode,
    window: Vec<f64>,
    filters: MelFilterBank,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for MelAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelAnalyzer")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .field("pad_mode", &self.pad_mode)
            .field("n_mels", &self.filters.n_mels())
            .finish()
    }
}

impl MelAnalyzer {
    pub fn new(config: &PipelineConfig) -> Self {
        let filters = MelFilterBank::new(
            config.sample_rate,
            config.n_fft,
            config.n_mels,
            config.fmin,
            config.resolved_fmax(),
        );
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.n_fft);

        MelAnalyzer {
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            pad_mode: config.pad_mode,
            window: hann_window(config.n_fft),
            filters,
            fft,
        }
    }

    /// Number of centered frames for a signal of `len` samples (`n_fft` is even)
    pub fn num_frames(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Compute the power mel-spectrogram of `samples`
    pub fn compute(&self, samples: &[f32]) -> MelSpectrogram {
        let padded = self.pad(samples);
        let n_frames = self.num_frames(samples.len());
        let n_bins = self.filters.n_bins();
        let n_mels = self.filters.n_mels();

        let mut data = vec![0.0; n_mels * n_frames];
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut power = vec![0.0; n_bins];

        for frame in 0..n_frames {
            let start = frame * self.hop_length;
            let chunk = &padded[start..start + self.n_fft];
            for ((slot, &s), &w) in buffer.iter_mut().zip(chunk.iter()).zip(self.window.iter()) {
                *slot = Complex::new(s * w, 0.0);
            }

            self.fft.process(&mut buffer);

            for (p, c) in power.iter_mut().zip(buffer.iter()) {
                *p = c.norm_sqr();
            }

            for m in 0..n_mels {
                let band = self.filters.band(m);
                data[m * n_frames + frame] = band.iter().zip(power.iter()).map(|(w, p)| w * p).sum();
            }
        }

        MelSpectrogram {
            data,
            n_mels,
            n_frames,
        }
    }

    fn pad(&self, samples: &[f32]) -> Vec<f64> {
        let pad = self.n_fft / 2;
        let n = samples.len() as isize;
        let total = samples.len() + 2 * pad;

        (0..total)
            .map(|i| {
                let src = i as isize - pad as isize;
                if (0..n).contains(&src) {
                    return samples[src as usize] as f64;
                }
                match self.pad_mode {
                    PadMode::Constant => 0.0,
                    PadMode::Reflect => {
                        if n <= 1 {
                            samples.first().copied().unwrap_or(0.0) as f64
                        } else {
                            samples[reflect_index(src, n)] as f64
                        }
                    }
                }
            })
            .collect()
    }
}

/// Mirror an out-of-range index back into `[0, n)` without repeating edges
fn reflect_index(i: isize, n: isize) -> usize {
    let period = 2 * (n - 1);
    let mut j = i.rem_euclid(period);
    if j >= n {
        j = period - j;
    }
    j as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 11025.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-9);
        }
        // Linear region: 200/3 Hz per mel
        assert_relative_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-12);
        // periodic: w[1] == w[7]
        assert_relative_eq!(w[1], w[7], epsilon = 1e-12);
    }

    #[test]
    fn test_filter_bank_shape_and_area_norm() {
        let bank = MelFilterBank::new(22050, 2048, 128, 0.0, 11025.0);
        assert_eq!(bank.n_mels(), 128);
        assert_eq!(bank.n_bins(), 1025);

        for m in 0..bank.n_mels() {
            assert!(bank.band(m).iter().all(|&w| w >= 0.0));
        }
        // Every band covers at least one FFT bin above the lowest bands
        assert!(bank.band(127).iter().any(|&w| w > 0.0));
    }

    #[test]
    fn test_reflect_index() {
        // [a b c d] reflected: ... c b | a b c d | c b ...
        assert_eq!(reflect_index(-1, 4), 1);
        assert_eq!(reflect_index(-2, 4), 2);
        assert_eq!(reflect_index(4, 4), 2);
        assert_eq!(reflect_index(5, 4), 1);
    }

    #[test]
    fn test_frame_count_is_centered() {
        let analyzer = MelAnalyzer::new(&PipelineConfig::default());
        assert_eq!(analyzer.num_frames(66150), 130);

        let mel = analyzer.compute(&vec![0.0; 66150]);
        assert_eq!(mel.n_mels, 128);
        assert_eq!(mel.n_frames, 130);
        assert!(mel.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_tone_energy_lands_in_matching_band() {
        let config = PipelineConfig::default();
        let analyzer = MelAnalyzer::new(&config);
        let tone: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 22050.0).sin())
            .collect();

        let mel = analyzer.compute(&tone);
        let frame = mel.n_frames / 2;
        let loudest = (0..mel.n_mels)
            .max_by(|&a, &b| {
                mel.data[a * mel.n_frames + frame].total_cmp(&mel.data[b * mel.n_frames + frame])
            })
            .unwrap();

        let target = hz_to_mel(1000.0);
        let mel_max = hz_to_mel(11025.0);
        let expected_band = (target / mel_max * 129.0).round() as usize - 1;
        assert!(
            (loudest as isize - expected_band as isize).abs() <= 1,
            "loudest band {} expected near {}",
            loudest,
            expected_band
        );
    }
}
