// Checkpoint persistence
//
// A checkpoint is two files side by side:
// - `<name>.safetensors`: every variable of the model's VarMap
// - `<name>.json`: model config, normalization stats and feature config
//
// Loading rebuilds the architecture from the sidecar first, then copies the
// stored weights into the freshly created variables.

use super::{ModelConfig, SequenceClassifier};
use crate::config::FeatureConfig;
use crate::dataset::FeatureStats;
use crate::error::ModelError;
use candle_core::Device;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything needed besides the weights to reproduce a model's inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub model: ModelConfig,
    pub stats: FeatureStats,
    pub features: FeatureConfig,
}

/// Path of the JSON sidecar belonging to a weights file
pub fn sidecar_path(weights: &Path) -> PathBuf {
    weights.with_extension("json")
}

fn checkpoint_error(path: &Path, reason: impl ToString) -> ModelError {
    ModelError::Checkpoint {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

impl SequenceClassifier {
    /// Write weights to `path` and the sidecar next to it
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        stats: &FeatureStats,
        features: &FeatureConfig,
    ) -> Result<(), ModelError> {
        let path = path.as_ref();
        if stats.feature_dim() != self.config.input_size {
            return Err(checkpoint_error(
                path,
                format!(
                    "stats width {} does not match input_size {}",
                    stats.feature_dim(),
                    self.config.input_size
                ),
            ));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        self.varmap
            .save(path)
            .map_err(|err| checkpoint_error(path, err))?;
        let meta = CheckpointMeta {
            model: self.config.clone(),
            stats: stats.clone(),
            features: features.clone(),
        };
        let json = serde_json::to_string_pretty(&meta).map_err(|err| checkpoint_error(path, err))?;
        fs::write(sidecar_path(path), json)?;

        log::info!("[SequenceClassifier] Saved checkpoint to {}", path.display());
        Ok(())
    }

    /// Rebuild a model from `path` and its sidecar on `device`
    pub fn load<P: AsRef<Path>>(
        path: P,
        device: &Device,
    ) -> Result<(Self, CheckpointMeta), ModelError> {
        let path = path.as_ref();
        let sidecar = sidecar_path(path);
        let raw = fs::read_to_string(&sidecar)
            .map_err(|err| checkpoint_error(&sidecar, err))?;
        let meta: CheckpointMeta =
            serde_json::from_str(&raw).map_err(|err| checkpoint_error(&sidecar, err))?;

        let mut model = Self::new(meta.model.clone(), device)?;
        model
            .varmap
            .load(path)
            .map_err(|err| checkpoint_error(path, err))?;

        log::info!(
            "[SequenceClassifier] Loaded {} checkpoint from {}",
            meta.model.variant,
            path.display()
        );
        Ok((model, meta))
    }
}
