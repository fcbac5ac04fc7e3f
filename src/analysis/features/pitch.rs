// Pitch module - YIN fundamental frequency and tonal contour shape
//
// Each frame gets one F0 estimate from the cumulative-mean-normalized
// difference function. Frames without a trough below the threshold, or with
// no energy, are unvoiced (F0 = 0). Frames are expected unwindowed, since a
// taper breaks the periodicity the difference function looks for. The voiced
// contour is then summarized by its median and by the share of rising,
// falling and stable pitch steps.
//
// References:
// - de Cheveigné, A., Kawahara, H. (2002). YIN, a fundamental frequency
//   estimator for speech and music. JASA 111(4).

use super::types::TonalFeatures;
use crate::analysis::frames::FrameBatch;
use crate::config::PitchConfig;
use ndarray::ArrayView1;

/// Frames with less total energy than this are unvoiced
const SILENCE_ENERGY: f32 = 1e-10;

/// Per-frame F0 contour with voicing decisions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchContour {
    pub f0_hz: Vec<f32>,
    pub voiced: Vec<bool>,
}

impl PitchContour {
    pub fn len(&self) -> usize {
        self.f0_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.f0_hz.is_empty()
    }

    pub fn voiced_count(&self) -> usize {
        self.voiced.iter().filter(|&&v| v).count()
    }
}

/// YIN estimator for a fixed sample rate and F0 range
pub struct YinEstimator {
    sample_rate: u32,
    fmin: f32,
    fmax: f32,
    threshold: f32,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, fmin: f32, fmax: f32, threshold: f32) -> Self {
        Self {
            sample_rate,
            fmin,
            fmax,
            threshold,
        }
    }

    pub fn from_config(config: &PitchConfig) -> Self {
        Self::new(
            config.sample_rate,
            config.fmin,
            config.fmax,
            config.yin_threshold,
        )
    }

    /// Estimate F0 of one frame; 0.0 when unvoiced
    pub fn estimate(&self, frame: ArrayView1<'_, f32>) -> f32 {
        let len = frame.len();
        let sr = self.sample_rate as f32;
        let tau_min = ((sr / self.fmax).floor() as usize).max(2);
        let tau_max = ((sr / self.fmin).floor() as usize).min(len / 2);
        if tau_max <= tau_min + 1 {
            return 0.0;
        }

        let energy: f32 = frame.iter().map(|x| x * x).sum();
        if energy < SILENCE_ENERGY {
            return 0.0;
        }

        // Difference function over a window that fits every lag
        let window = len - tau_max;
        let mut diff = vec![0.0f32; tau_max + 1];
        for (tau, d) in diff.iter_mut().enumerate().skip(1) {
            let mut acc = 0.0f32;
            for j in 0..window {
                let delta = frame[j] - frame[j + tau];
                acc += delta * delta;
            }
            *d = acc;
        }

        // Cumulative mean normalization
        let mut cmnd = vec![1.0f32; tau_max + 1];
        let mut running = 0.0f32;
        for tau in 1..=tau_max {
            running += diff[tau];
            cmnd[tau] = if running > 0.0 {
                diff[tau] * tau as f32 / running
            } else {
                1.0
            };
        }

        // First dip below threshold, followed down to its local minimum
        let mut tau = tau_min;
        while tau < tau_max {
            if cmnd[tau] < self.threshold {
                while tau + 1 < tau_max && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                let refined = parabolic_interpolation(&cmnd, tau);
                if refined <= 0.0 {
                    return 0.0;
                }
                let f0 = sr / refined;
                return if f0.is_finite() { f0 } else { 0.0 };
            }
            tau += 1;
        }

        0.0
    }

    /// Estimate F0 for every frame of a batch
    pub fn contour(&self, frames: &FrameBatch) -> PitchContour {
        let f0_hz: Vec<f32> = frames.rows().into_iter().map(|f| self.estimate(f)).collect();
        let voiced = f0_hz.iter().map(|&f| f.is_finite() && f > 0.0).collect();
        PitchContour { f0_hz, voiced }
    }
}

/// Refine a minimum location using its two neighbours
fn parabolic_interpolation(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return index as f32;
    }
    let (a, b, c) = (values[index - 1], values[index], values[index + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f32::EPSILON {
        return index as f32;
    }
    let shift = 0.5 * (a - c) / denom;
    index as f32 + shift.clamp(-1.0, 1.0)
}

/// Median of voiced F0 values; 0.0 when no frame is voiced
pub fn estimate_f0(contour: &PitchContour) -> f32 {
    let mut voiced: Vec<f32> = contour
        .f0_hz
        .iter()
        .zip(&contour.voiced)
        .filter(|(_, &v)| v)
        .map(|(&f, _)| f)
        .collect();
    if voiced.is_empty() {
        return 0.0;
    }
    voiced.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = voiced.len() / 2;
    if voiced.len() % 2 == 0 {
        0.5 * (voiced[mid - 1] + voiced[mid])
    } else {
        voiced[mid]
    }
}

/// Rise/fall/stable ratios over consecutive voiced frames
///
/// A step is valid only when both neighbouring frames are voiced.
pub fn extract_tonal_features(contour: &PitchContour, delta_hz: f32) -> TonalFeatures {
    let masked: Vec<f32> = contour
        .f0_hz
        .iter()
        .zip(&contour.voiced)
        .map(|(&f, &v)| if v { f } else { f32::NAN })
        .collect();

    let (mut rise, mut fall, mut stable) = (0usize, 0usize, 0usize);
    for pair in masked.windows(2) {
        let d = pair[1] - pair[0];
        if d.is_nan() {
            continue;
        }
        if d > delta_hz {
            rise += 1;
        } else if d < -delta_hz {
            fall += 1;
        } else {
            stable += 1;
        }
    }

    let total = rise + fall + stable;
    if total == 0 {
        return TonalFeatures::default();
    }
    let total = total as f32;
    TonalFeatures {
        rise_ratio: rise as f32 / total,
        fall_ratio: fall as f32 / total,
        stable_ratio: stable as f32 / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frames::segment_frames;
    use std::f32::consts::PI;

    fn contour(f0: &[f32]) -> PitchContour {
        PitchContour {
            f0_hz: f0.to_vec(),
            voiced: f0.iter().map(|&f| f > 0.0).collect(),
        }
    }

    #[test]
    fn test_yin_finds_sine_pitch() {
        let sr = 16_000;
        let signal: Vec<f32> = (0..sr)
            .map(|i| 0.6 * (2.0 * PI * 200.0 * i as f32 / sr as f32).sin())
            .collect();
        let config = PitchConfig::default();
        let (frame, hop) = config.frame_and_hop();
        let frames = segment_frames(&signal, frame, hop);
        let contour = YinEstimator::from_config(&config).contour(&frames);

        assert!(contour.voiced_count() > contour.len() / 2);
        let f0 = estimate_f0(&contour);
        assert!((f0 - 200.0).abs() < 5.0, "estimated {} Hz", f0);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let frames = segment_frames(&[0.0; 4000], 400, 160);
        let contour = YinEstimator::from_config(&PitchConfig::default()).contour(&frames);
        assert_eq!(contour.voiced_count(), 0);
        assert_eq!(estimate_f0(&contour), 0.0);
    }

    #[test]
    fn test_median_of_voiced_frames() {
        let c = contour(&[0.0, 100.0, 300.0, 0.0, 200.0]);
        assert_eq!(estimate_f0(&c), 200.0);
    }

    #[test]
    fn test_tonal_ratios_sum_to_one() {
        let c = contour(&[100.0, 110.0, 111.0, 100.0, 0.0, 150.0, 152.0]);
        let t = extract_tonal_features(&c, 5.0);
        // valid steps: +10 rise, +1 stable, -11 fall, +2 stable
        assert!((t.rise_ratio - 0.25).abs() < 1e-6);
        assert!((t.fall_ratio - 0.25).abs() < 1e-6);
        assert!((t.stable_ratio - 0.5).abs() < 1e-6);
        assert!((t.rise_ratio + t.fall_ratio + t.stable_ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tonal_ratios_zero_without_consecutive_voicing() {
        assert_eq!(
            extract_tonal_features(&contour(&[120.0]), 5.0),
            TonalFeatures::default()
        );
        assert_eq!(
            extract_tonal_features(&contour(&[120.0, 0.0, 130.0]), 5.0),
            TonalFeatures::default()
        );
        assert_eq!(
            extract_tonal_features(&PitchContour::default(), 5.0),
            TonalFeatures::default()
        );
    }
}
