// Feature extraction for speech-based deception classification
//
// Two independent feature paths are computed from the same normalized signal:
// - the cepstral path (MFCC + delta + delta-delta per frame) that feeds the
//   sequence classifier
// - the prosodic path (pitch contour shape and stress heuristics), reduced to
//   one set of scalars per recording and consumed by the hyperparameter advisor
//
// Module organization:
// - types: scalar descriptor structs (TonalFeatures, StressFeatures)
// - fft: centered power STFT
// - mel: Slaney mel filterbank
// - mfcc: cepstra and regression deltas
// - pitch: YIN F0 contour, median F0, tonal ratios
// - stress: RMS energy variability and zero-crossing rate
// - mod.rs: Coordinator (ProsodyAnalyzer)
//
// References:
// - Davis, S., Mermelstein, P. (1980). Comparison of parametric
//   representations for monosyllabic word recognition
// - de Cheveigné, A., Kawahara, H. (2002). YIN

mod fft;
mod mel;
mod mfcc;
mod pitch;
mod stress;
mod types;

pub use fft::FftProcessor;
pub use mel::{hz_to_mel, mel_to_hz, MelFilterbank};
pub use mfcc::{compute_deltas, dct_ii_ortho, power_to_db, MfccExtractor, DELTA_N};
pub use pitch::{estimate_f0, extract_tonal_features, PitchContour, YinEstimator};
pub use stress::{compute_rms, compute_zcr, extract_stress_features};
pub use types::{StressFeatures, TonalFeatures};

use crate::analysis::frames::segment_frames;
use crate::config::PitchConfig;
use serde::{Deserialize, Serialize};

/// Prosodic summary of one recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProsodyFeatures {
    /// Median F0 of voiced frames in Hz (0.0 when nothing is voiced)
    pub f0_median: f32,
    pub tonal: TonalFeatures,
    pub stress: StressFeatures,
}

/// ProsodyAnalyzer coordinates framing, pitch tracking and stress analysis
///
/// Pitch runs on raw frames; stress statistics run on windowed frames whose
/// window length equals the frame length.
pub struct ProsodyAnalyzer {
    config: PitchConfig,
    yin: YinEstimator,
}

impl ProsodyAnalyzer {
    pub fn new(config: PitchConfig) -> Self {
        let yin = YinEstimator::from_config(&config);
        Self { config, yin }
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    /// Analyze a mono signal sampled at `config.sample_rate`
    ///
    /// A signal shorter than one frame yields all-zero descriptors.
    pub fn analyze(&self, signal: &[f32]) -> ProsodyFeatures {
        let (frame, hop) = self.config.frame_and_hop();
        let frames = segment_frames(signal, frame, hop);
        if frames.is_empty() {
            log::debug!(
                "[ProsodyAnalyzer] Signal of {} samples shorter than one frame ({})",
                signal.len(),
                frame
            );
            return ProsodyFeatures::default();
        }

        let contour = self.yin.contour(&frames);
        let f0_median = estimate_f0(&contour);
        let tonal = extract_tonal_features(&contour, self.config.tonal_delta_hz);

        let windowed = frames.apply_window(self.config.window);
        let stress = extract_stress_features(&windowed, self.config.energy_eps);

        ProsodyFeatures {
            f0_median,
            tonal,
            stress,
        }
    }
}
