// Inference module - verdicts for single recordings
//
// A ModelPredictor loads one checkpoint and serves any number of requests
// read-only. Every request runs the same front end the dataset builder
// used (resample, pre-emphasis, MFCC + deltas, corpus normalization) over
// the whole recording, then reads p(lie) from the classifier.

use crate::analysis::features::MfccExtractor;
use crate::audio::{decode_audio_bytes, into_signal, load_audio};
use crate::dataset::{apply_pre_emphasis, Label, LABEL_VOCABULARY};
use crate::error::{log_model_error, log_predict_error, ErrorCode, ModelError, PredictError};
use crate::model::{parse_device, CheckpointMeta, SequenceClassifier};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default decision threshold on p(lie)
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Classification of one recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Probability of the reported label, in percent
    pub confidence: f32,
    pub lie_probability: f32,
}

impl Verdict {
    /// Lie when p(lie) >= threshold, Truth otherwise
    pub fn from_lie_probability(lie_probability: f32, threshold: f32) -> Self {
        let (label, probability) = if lie_probability >= threshold {
            (Label::Lie, lie_probability)
        } else {
            (Label::Truth, 1.0 - lie_probability)
        };
        Self {
            label,
            confidence: probability * 100.0,
            lie_probability,
        }
    }
}

/// Anything that turns encoded audio into a verdict
pub trait Predictor {
    fn predict(&self, audio: &[u8]) -> Result<Verdict, PredictError>;
}

/// Checkpoint-backed predictor
pub struct ModelPredictor {
    model: SequenceClassifier,
    meta: CheckpointMeta,
    extractor: MfccExtractor,
    threshold: f32,
}

impl ModelPredictor {
    /// Load a checkpoint onto `device` ("cpu", "cuda[:N]", "metal")
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        device: &str,
        threshold: f32,
    ) -> Result<Self, PredictError> {
        let device = parse_device(device)?;
        let (model, meta) = SequenceClassifier::load(model_path, &device).map_err(|err| {
            log_model_error(&err, "ModelPredictor::load");
            err
        })?;
        let extractor = MfccExtractor::new(&meta.features);
        Ok(Self {
            model,
            meta,
            extractor,
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn meta(&self) -> &CheckpointMeta {
        &self.meta
    }

    /// Predict from a file on disk (video containers are rejected)
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<Verdict, PredictError> {
        let signal = load_audio(path, self.meta.features.sample_rate)?;
        self.predict_samples(signal.samples())
    }

    /// Predict from mono samples already at the checkpoint's sample rate
    pub fn predict_samples(&self, samples: &[f32]) -> Result<Verdict, PredictError> {
        let emphasized = apply_pre_emphasis(samples, self.meta.features.pre_emphasis);
        let features = self.extractor.extract(&emphasized);
        if features.nrows() == 0 {
            let err = PredictError::NoFeatures {
                samples: samples.len(),
            };
            log_predict_error(&err, "predict_samples");
            return Err(err);
        }
        let normalized = self.meta.stats.normalize(&features).map_err(|err| {
            PredictError::Model(ModelError::Checkpoint {
                path: "normalization stats".to_string(),
                reason: err.message(),
            })
        })?;

        let (steps, dim) = normalized.dim();
        let data: Vec<f32> = normalized.iter().copied().collect();
        let xs = Tensor::from_vec(data, (1, steps, dim), self.model.device())?;
        let probs = self.model.probabilities(&xs)?.to_vec2::<f32>()?;
        let lie = LABEL_VOCABULARY.index_of(Label::Lie) as usize;
        let lie_probability = probs
            .first()
            .and_then(|row| row.get(lie))
            .copied()
            .unwrap_or(0.0);

        let verdict = Verdict::from_lie_probability(lie_probability, self.threshold);
        log::debug!(
            "[Predictor] {} frames -> p(lie)={:.3} => {} ({:.1}%)",
            steps,
            lie_probability,
            verdict.label,
            verdict.confidence
        );
        Ok(verdict)
    }
}

impl Predictor for ModelPredictor {
    fn predict(&self, audio: &[u8]) -> Result<Verdict, PredictError> {
        let decoded = decode_audio_bytes(audio, None)?;
        let signal = into_signal(decoded, self.meta.features.sample_rate, "<request>")?;
        self.predict_samples(signal.samples())
    }
}

/// One-shot prediction: returns the label and its confidence in percent
pub fn predict<P: AsRef<Path>, Q: AsRef<Path>>(
    file_path: P,
    model_path: Q,
    threshold: f32,
) -> Result<(Label, f32), PredictError> {
    let predictor = ModelPredictor::load(model_path, "cpu", threshold)?;
    let verdict = predictor.predict_file(file_path)?;
    Ok((verdict.label, verdict.confidence))
}
