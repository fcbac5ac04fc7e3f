// Types module - Data structures for prosodic features
//
// Scalar descriptors computed once per file (or segment) on the pitch/stress
// path. They are not fed to the classifier; the advisor summarizes them.

use serde::{Deserialize, Serialize};

/// Shape of the F0 contour
///
/// The three ratios partition the valid (voiced-to-voiced) pitch steps, so
/// they sum to 1.0 whenever at least one valid step exists and are all 0.0
/// otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TonalFeatures {
    /// Share of steps rising by more than the threshold
    pub rise_ratio: f32,

    /// Share of steps falling by more than the threshold
    pub fall_ratio: f32,

    /// Share of steps within +/- threshold
    pub stable_ratio: f32,
}

/// Stress heuristics from short-time energy and zero-crossing rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressFeatures {
    /// Mean per-frame zero-crossing rate
    pub zcr_mean: f32,

    /// Population standard deviation of the per-frame zero-crossing rate
    pub zcr_std: f32,

    /// Coefficient of variation of per-frame RMS energy
    ///
    /// High values indicate uneven loudness (emphasis, hesitation bursts).
    pub energy_cv: f32,
}
