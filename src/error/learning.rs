// Model, training and inference error types and constants

use crate::error::{AudioError, DatasetError, ErrorCode};
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 4001-4005
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Model configuration is invalid (zero sizes, dropout out of range)
    pub const INVALID_CONFIG: i32 = 4001;

    /// Tensor backend reported a failure
    pub const BACKEND: i32 = 4002;

    /// Checkpoint missing, corrupt or incompatible
    pub const CHECKPOINT: i32 = 4003;

    /// Requested device is unknown or unavailable
    pub const DEVICE: i32 = 4004;

    /// Underlying I/O failure
    pub const IO: i32 = 4005;
}

/// Training error code constants
///
/// Error code range: 5001-5004
pub struct TrainErrorCodes {}

impl TrainErrorCodes {
    /// Store could not be loaded or labels could not be encoded
    pub const DATASET: i32 = 5001;

    /// Model construction or forward/backward failed
    pub const MODEL: i32 = 5002;

    /// Training partition is empty
    pub const EMPTY_PARTITION: i32 = 5003;

    /// Underlying I/O failure
    pub const IO: i32 = 5004;
}

/// Prediction error code constants
///
/// Error code range: 6001-6003
pub struct PredictErrorCodes {}

impl PredictErrorCodes {
    /// Request audio could not be decoded
    pub const AUDIO: i32 = 6001;

    /// Checkpoint load or forward pass failed
    pub const MODEL: i32 = 6002;

    /// Audio was too short to yield a feature frame
    pub const NO_FEATURES: i32 = 6003;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, context: &str) {
    error!(
        "Model error in {}: code={}, component=SequenceClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Log a training error with structured context
pub fn log_train_error(err: &TrainError, context: &str) {
    error!(
        "Training error in {}: code={}, component=TrainingLoop, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Log a prediction error with structured context
pub fn log_predict_error(err: &PredictError, context: &str) {
    error!(
        "Prediction error in {}: code={}, component=Predictor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sequence classifier errors
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A configuration field is out of range
    InvalidConfig { reason: String },

    /// candle reported an error during build, forward or optimisation
    Backend { reason: String },

    /// Checkpoint weights or sidecar could not be used
    Checkpoint { path: String, reason: String },

    /// Device string could not be resolved
    Device { requested: String, reason: String },

    /// File system failure
    Io { details: String },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::InvalidConfig { .. } => ModelErrorCodes::INVALID_CONFIG,
            ModelError::Backend { .. } => ModelErrorCodes::BACKEND,
            ModelError::Checkpoint { .. } => ModelErrorCodes::CHECKPOINT,
            ModelError::Device { .. } => ModelErrorCodes::DEVICE,
            ModelError::Io { .. } => ModelErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::InvalidConfig { reason } => format!("Invalid model config: {}", reason),
            ModelError::Backend { reason } => format!("Tensor backend error: {}", reason),
            ModelError::Checkpoint { path, reason } => {
                format!("Checkpoint {} unusable: {}", path, reason)
            }
            ModelError::Device { requested, reason } => {
                format!("Device '{}' unavailable: {}", requested, reason)
            }
            ModelError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ModelError {}

impl From<candle_core::Error> for ModelError {
    fn from(err: candle_core::Error) -> Self {
        ModelError::Backend {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Io {
            details: err.to_string(),
        }
    }
}

/// Training loop errors
#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    /// Store loading or label encoding failed
    Dataset(DatasetError),

    /// Model build or optimisation step failed
    Model(ModelError),

    /// The named partition has no samples
    EmptyPartition { partition: String, total: usize },

    /// File system failure (metrics report, checkpoint directory)
    Io { details: String },
}

impl ErrorCode for TrainError {
    fn code(&self) -> i32 {
        match self {
            TrainError::Dataset(_) => TrainErrorCodes::DATASET,
            TrainError::Model(_) => TrainErrorCodes::MODEL,
            TrainError::EmptyPartition { .. } => TrainErrorCodes::EMPTY_PARTITION,
            TrainError::Io { .. } => TrainErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            TrainError::Dataset(err) => err.message(),
            TrainError::Model(err) => err.message(),
            TrainError::EmptyPartition { partition, total } => format!(
                "{} partition is empty ({} samples in store)",
                partition, total
            ),
            TrainError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrainError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for TrainError {}

impl From<DatasetError> for TrainError {
    fn from(err: DatasetError) -> Self {
        TrainError::Dataset(err)
    }
}

impl From<ModelError> for TrainError {
    fn from(err: ModelError) -> Self {
        TrainError::Model(err)
    }
}

impl From<candle_core::Error> for TrainError {
    fn from(err: candle_core::Error) -> Self {
        TrainError::Model(err.into())
    }
}

impl From<std::io::Error> for TrainError {
    fn from(err: std::io::Error) -> Self {
        TrainError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrainError {
    fn from(err: serde_json::Error) -> Self {
        TrainError::Io {
            details: err.to_string(),
        }
    }
}

/// Inference errors
#[derive(Debug, Clone, PartialEq)]
pub enum PredictError {
    /// Request audio could not be decoded or resampled
    Audio(AudioError),

    /// Checkpoint or forward pass failure
    Model(ModelError),

    /// Signal shorter than one analysis frame
    NoFeatures { samples: usize },
}

impl ErrorCode for PredictError {
    fn code(&self) -> i32 {
        match self {
            PredictError::Audio(_) => PredictErrorCodes::AUDIO,
            PredictError::Model(_) => PredictErrorCodes::MODEL,
            PredictError::NoFeatures { .. } => PredictErrorCodes::NO_FEATURES,
        }
    }

    fn message(&self) -> String {
        match self {
            PredictError::Audio(err) => err.message(),
            PredictError::Model(err) => err.message(),
            PredictError::NoFeatures { samples } => format!(
                "No feature frames could be extracted from {} samples",
                samples
            ),
        }
    }
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PredictError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PredictError {}

impl From<AudioError> for PredictError {
    fn from(err: AudioError) -> Self {
        PredictError::Audio(err)
    }
}

impl From<ModelError> for PredictError {
    fn from(err: ModelError) -> Self {
        PredictError::Model(err)
    }
}

impl From<candle_core::Error> for PredictError {
    fn from(err: candle_core::Error) -> Self {
        PredictError::Model(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_error_codes() {
        assert_eq!(
            ModelError::Device {
                requested: "tpu".to_string(),
                reason: "unknown".to_string()
            }
            .code(),
            ModelErrorCodes::DEVICE
        );
        assert_eq!(
            TrainError::EmptyPartition {
                partition: "train".to_string(),
                total: 1
            }
            .code(),
            TrainErrorCodes::EMPTY_PARTITION
        );
        assert_eq!(
            PredictError::NoFeatures { samples: 10 }.code(),
            PredictErrorCodes::NO_FEATURES
        );
    }

    #[test]
    fn test_errors_convert_upward() {
        let dataset = DatasetError::UnknownLabel {
            label: "maybe".to_string(),
            index: Some(0),
        };
        let train: TrainError = dataset.clone().into();
        assert_eq!(train, TrainError::Dataset(dataset));

        let audio = AudioError::EmptySignal {
            path: "<bytes>".to_string(),
        };
        let predict: PredictError = audio.into();
        assert_eq!(predict.code(), PredictErrorCodes::AUDIO);
    }

    #[test]
    fn test_nested_message_is_preserved() {
        let model = ModelError::InvalidConfig {
            reason: "hidden_size must be > 0".to_string(),
        };
        let train = TrainError::from(model.clone());
        assert_eq!(train.message(), model.message());
        assert!(format!("{}", train).contains("5002"));
    }
}
