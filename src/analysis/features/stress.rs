// Stress module - Time-domain energy and zero-crossing statistics
//
// Computes per-frame RMS energy and zero-crossing rate over a FrameBatch and
// summarizes them into StressFeatures.
//
// References:
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

use super::types::StressFeatures;
use crate::analysis::frames::FrameBatch;
use ndarray::ArrayView1;

/// Guard added to the energy mean before dividing
const CV_EPS: f32 = 1e-8;

/// Compute zero-crossing rate of one frame
///
/// Counts sign changes (zero counts as positive) and normalizes by the
/// number of adjacent sample pairs, giving a value in [0, 1].
pub fn compute_zcr(frame: ArrayView1<'_, f32>) -> f32 {
    let n = frame.len();
    if n < 2 {
        return 0.0;
    }

    let mut crossings = 0usize;
    for i in 1..n {
        if (frame[i] >= 0.0) != (frame[i - 1] >= 0.0) {
            crossings += 1;
        }
    }

    crossings as f32 / (n - 1) as f32
}

/// Root-mean-square energy of one frame with `eps` inside the square root
pub fn compute_rms(frame: ArrayView1<'_, f32>, eps: f32) -> f32 {
    if frame.is_empty() {
        return eps.sqrt();
    }
    let mean_sq = frame.iter().map(|x| x * x).sum::<f32>() / frame.len() as f32;
    (mean_sq + eps).sqrt()
}

/// Mean and population standard deviation
fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean as f32, var.sqrt() as f32)
}

/// Summarize stress descriptors of a batch; all zero for an empty batch
pub fn extract_stress_features(frames: &FrameBatch, energy_eps: f32) -> StressFeatures {
    if frames.is_empty() {
        return StressFeatures::default();
    }

    let energy: Vec<f32> = frames.rows().into_iter().map(|f| compute_rms(f, energy_eps)).collect();
    let zcr: Vec<f32> = frames.rows().into_iter().map(compute_zcr).collect();

    let (energy_mean, energy_std) = mean_std(&energy);
    let (zcr_mean, zcr_std) = mean_std(&zcr);

    StressFeatures {
        zcr_mean,
        zcr_std,
        energy_cv: energy_std / (energy_mean + CV_EPS),
    }
}
