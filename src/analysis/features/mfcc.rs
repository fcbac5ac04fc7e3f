// MFCC module - cepstral features with first and second order deltas
//
// Pipeline per segment:
// 1. Centered power STFT (periodic window)
// 2. Slaney mel projection
// 3. dB relative to the segment's own maximum, floored at -80 dB
// 4. Orthonormal DCT-II, first n_mfcc coefficients
// 5. Regression deltas over +/-4 frames (edge replication), delta of delta
// 6. Stack [static; delta; delta2] and transpose to (time, 3 * n_mfcc)

use super::fft::FftProcessor;
use super::mel::MelFilterbank;
use crate::config::FeatureConfig;
use ndarray::{concatenate, Array2, Axis};

/// Power floor before taking the logarithm
const AMIN: f32 = 1e-10;

/// Dynamic range kept below the segment maximum
const TOP_DB: f32 = 80.0;

/// Half-width of the delta regression window (width 9)
pub const DELTA_N: usize = 4;

/// MFCC(+delta+delta-delta) extractor with pre-computed transforms
pub struct MfccExtractor {
    fft: FftProcessor,
    mel: MelFilterbank,
    /// (n_mfcc, n_mels)
    dct: Array2<f32>,
    hop: usize,
    n_mfcc: usize,
}

impl MfccExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            fft: FftProcessor::new(config.n_fft, config.window),
            mel: MelFilterbank::new(
                config.sample_rate,
                config.n_fft,
                config.n_mels,
                config.fmin,
                config.fmax(),
            ),
            dct: dct_ii_ortho(config.n_mfcc, config.n_mels),
            hop: config.hop(),
            n_mfcc: config.n_mfcc,
        }
    }

    /// Width of the rows returned by [`MfccExtractor::extract`]
    pub fn feature_dim(&self) -> usize {
        self.n_mfcc * 3
    }

    /// Static MFCCs, shape (n_mfcc, frames)
    pub fn mfcc(&self, segment: &[f32]) -> Array2<f32> {
        let power = self.fft.power_spectrogram(segment, self.hop);
        let mel = self.mel.apply(&power);
        let log_mel = power_to_db(&mel);
        self.dct.dot(&log_mel)
    }

    /// Time-major MFCC + delta + delta-delta, shape (frames, 3 * n_mfcc)
    pub fn extract(&self, segment: &[f32]) -> Array2<f32> {
        let mfcc = self.mfcc(segment);
        let delta = compute_deltas(&mfcc, DELTA_N);
        let delta2 = compute_deltas(&delta, DELTA_N);

        let stacked = concatenate(Axis(0), &[mfcc.view(), delta.view(), delta2.view()])
            .unwrap_or_else(|_| Array2::zeros((self.feature_dim(), 0)));
        stacked.reversed_axes().as_standard_layout().to_owned()
    }
}

/// Convert power to dB relative to the maximum of `power`
pub fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let max = power.iter().copied().fold(0.0f32, f32::max);
    let reference = 10.0 * max.max(AMIN).log10();
    power.mapv(|p| (10.0 * p.max(AMIN).log10() - reference).max(-TOP_DB))
}

/// Orthonormal DCT-II matrix, shape (n_out, n_in)
pub fn dct_ii_ortho(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f64;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        (scale * (std::f64::consts::PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
            as f32
    })
}

/// Regression deltas along time (axis 1) with edge replication
///
/// d[t] = sum_{n=1..N} n * (c[t+n] - c[t-n]) / (2 * sum_{n=1..N} n^2)
pub fn compute_deltas(features: &Array2<f32>, half_width: usize) -> Array2<f32> {
    let (rows, frames) = features.dim();
    let mut out = Array2::<f32>::zeros((rows, frames));
    if frames == 0 || half_width == 0 {
        return out;
    }

    let denom: f32 = 2.0 * (1..=half_width).map(|n| (n * n) as f32).sum::<f32>();
    let last = frames - 1;
    for r in 0..rows {
        for t in 0..frames {
            let mut acc = 0.0f32;
            for n in 1..=half_width {
                let ahead = features[[r, (t + n).min(last)]];
                let behind = features[[r, t.saturating_sub(n)]];
                acc += n as f32 * (ahead - behind);
            }
            out[[r, t]] = acc / denom;
        }
    }
    out
}
