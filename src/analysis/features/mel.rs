// Mel module - Slaney-style triangular filterbank
//
// Linear below 1 kHz, logarithmic above. Each triangle is area-normalized
// (2 / bandwidth) so bands carry comparable energy.

use ndarray::Array2;

const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;
// ln(6.4) / 27
const LOGSTEP: f32 = 0.068_751_78;

#[inline]
pub fn hz_to_mel(freq: f32) -> f32 {
    if freq >= MIN_LOG_HZ {
        MIN_LOG_MEL + (freq / MIN_LOG_HZ).ln() / LOGSTEP
    } else {
        freq / F_SP
    }
}

#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (LOGSTEP * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Mel projection matrix of shape (n_mels, n_fft / 2 + 1)
pub struct MelFilterbank {
    weights: Array2<f32>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f32> = (0..n_bins)
            .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let mut weights = Array2::<f32>::zeros((n_mels, n_bins));
        for m in 0..n_mels {
            let lower_width = (edges[m + 1] - edges[m]).max(f32::EPSILON);
            let upper_width = (edges[m + 2] - edges[m + 1]).max(f32::EPSILON);
            let enorm = 2.0 / (edges[m + 2] - edges[m]).max(f32::EPSILON);
            for (k, &f) in fft_freqs.iter().enumerate() {
                let lower = (f - edges[m]) / lower_width;
                let upper = (edges[m + 2] - f) / upper_width;
                let w = lower.min(upper).max(0.0);
                weights[[m, k]] = w * enorm;
            }
        }

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.nrows()
    }

    /// Project a power spectrogram (bins x frames) to mel bands (mels x frames)
    pub fn apply(&self, power: &Array2<f32>) -> Array2<f32> {
        self.weights.dot(power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_roundtrip_points() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
        assert!((mel_to_hz(15.0) - 1000.0).abs() < 1e-2);
        assert!((mel_to_hz(hz_to_mel(4000.0)) - 4000.0).abs() < 0.5);
    }

    #[test]
    fn test_filterbank_shape_and_coverage() {
        let bank = MelFilterbank::new(16_000, 1024, 64, 20.0, 8000.0);
        assert_eq!(bank.weights.shape(), &[64, 513]);
        for m in 0..64 {
            let row_sum: f32 = bank.weights.row(m).sum();
            assert!(row_sum > 0.0, "mel band {} has no support", m);
        }
        // Nothing below fmin
        assert_eq!(bank.weights[[0, 0]], 0.0);
    }
}
