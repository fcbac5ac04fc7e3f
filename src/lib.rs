// Vocal Truth Core - speech deception classifier
// Offline pipeline: audio -> MFCC/prosody features -> tensor store ->
// fuzzy hyperparameter advice -> recurrent classifier -> verdict

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fuzzy;
pub mod inference;
pub mod model;
pub mod training;

// Re-exports for convenience
pub use audio::{load_audio, Signal};
pub use config::AppConfig;
pub use dataset::{run_preprocessing, Label, TensorStore, LABEL_VOCABULARY};
pub use fuzzy::{run_fuzzy_optimization, Recommendation};
pub use inference::{predict, ModelPredictor, Predictor, Verdict};
pub use model::{ModelConfig, RecurrentVariant, SequenceClassifier};
pub use training::{evaluate_model_on_store, train_validate_test, Metrics, TrainOptions};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber (RUST_LOG filter, default `info`)
///
/// Output goes to stderr so stdout stays machine-readable. `log` records
/// from library code are bridged into the same output. Calling this more
/// than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        log::info!("logging initialized twice without panicking");
    }
}
