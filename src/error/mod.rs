// Error types for the vocal_truth pipeline
//
// This module defines one error enum per pipeline stage (audio loading,
// dataset building, hyperparameter advice, model/training/inference). Each
// carries a stable numeric code so front ends can report failures without
// matching on variants.

mod advisor;
mod audio;
mod dataset;
mod learning;

pub use advisor::{log_advisor_error, AdvisorError, AdvisorErrorCodes};
pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use dataset::{log_dataset_error, DatasetError, DatasetErrorCodes};
pub use learning::{
    log_model_error, log_predict_error, log_train_error, ModelError, ModelErrorCodes,
    PredictError, PredictErrorCodes, TrainError, TrainErrorCodes,
};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library boundary (CLI, service wrappers).
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
