// Training module - supervised loop over a tensor store
//
// Architecture:
// - split: seeded train/val/test partitions (plain or stratified)
// - metrics: accuracy, F1, macro scores, ROC AUC, confusion matrix
// - evaluate: stand-alone checkpoint evaluation on a store
// - mod.rs: TrainOptions, hyperparameter merge, epoch loop
//
// The whole store is loaded into memory once; batches are gathered from
// it per step. Labels go through the closed vocabulary, so lie = 0 and
// truth = 1 everywhere.

mod evaluate;
mod metrics;
mod split;

pub use evaluate::{evaluate_model_on_store, EvaluationReport};
pub use metrics::{accuracy, confusion_matrix, f1_score, macro_scores, precision_recall_f1, roc_auc};
pub use split::{split_indices, Partitions, SplitFractions};

use crate::config::{FeatureConfig, TrainingDefaults};
use crate::dataset::{encode_labels, FeatureStats, Label, TensorStore, LABEL_VOCABULARY};
use crate::error::{log_train_error, DatasetError, TrainError};
use crate::fuzzy::Recommendation;
use crate::model::{parse_device, ModelConfig, RecurrentVariant, SequenceClassifier};
use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters of one training run
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Advisor output; each present field overrides the model default
    pub hyperparameters: Option<Recommendation>,
    pub variant: RecurrentVariant,
    pub device: String,
    pub epochs: usize,
    pub batch_size: usize,
    pub split: SplitFractions,
    pub stratify: bool,
    pub seed: u64,
    /// Keep the trained model in the outcome
    pub return_model: bool,
    /// Save a checkpoint (weights + sidecar) here after training
    pub checkpoint: Option<PathBuf>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self::from_defaults(&TrainingDefaults::default())
    }
}

impl TrainOptions {
    pub fn from_defaults(defaults: &TrainingDefaults) -> Self {
        Self {
            hyperparameters: None,
            variant: defaults.variant,
            device: defaults.device.clone(),
            epochs: defaults.epochs,
            batch_size: defaults.batch_size,
            split: SplitFractions::default(),
            stratify: defaults.stratify,
            seed: defaults.seed,
            return_model: false,
            checkpoint: None,
        }
    }
}

/// Validation and test scores; F1 treats `lie` as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub val_acc: f64,
    pub val_f1: f64,
    pub test_acc: f64,
    pub test_f1: f64,
}

/// Result of [`train_validate_test`]
pub struct TrainOutcome {
    pub metrics: Metrics,
    /// Mean batch loss per epoch
    pub epoch_losses: Vec<f32>,
    pub config: ModelConfig,
    pub model: Option<SequenceClassifier>,
}

/// Merge advisor output over the defaults for `input_size` features
///
/// The hidden size is truncated to an integer.
pub fn build_model_config(
    input_size: usize,
    variant: RecurrentVariant,
    hyperparameters: Option<&Recommendation>,
) -> ModelConfig {
    let mut config = ModelConfig {
        input_size,
        variant,
        ..ModelConfig::default()
    };
    if let Some(rec) = hyperparameters {
        if let Some(lr) = rec.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(hidden) = rec.hidden_size {
            config.hidden_size = (hidden.max(1.0)) as usize;
        }
        if let Some(dropout) = rec.dropout {
            config.dropout = dropout as f32;
        }
    }
    config
}

/// Store contents ready for batching
pub(crate) struct LabeledData {
    pub features: Array3<f32>,
    pub labels: Vec<u32>,
    pub stats: FeatureStats,
    /// Front end the store was built with, when recorded
    pub front_end: Option<FeatureConfig>,
}

pub(crate) fn load_labeled_store(path: &Path) -> Result<LabeledData, TrainError> {
    let store = TensorStore::open(path)?;
    let labels = encode_labels(store.labels(), &LABEL_VOCABULARY)?;
    let features = store.features()?;
    log::info!(
        "[TrainingLoop] Loaded {} segments of {} x {} from {}",
        store.len(),
        store.time_steps(),
        store.feature_dim(),
        path.display()
    );
    Ok(LabeledData {
        features,
        labels,
        stats: FeatureStats {
            mean: store.feature_mean().to_vec(),
            std: store.feature_std().to_vec(),
        },
        front_end: store.feature_config().ok().cloned(),
    })
}

/// Gather rows `indices` into a (B, T, F) tensor
pub(crate) fn gather_features(
    features: &Array3<f32>,
    indices: &[usize],
    device: &Device,
) -> Result<Tensor, TrainError> {
    let (_, t, f) = features.dim();
    let mut data = Vec::with_capacity(indices.len() * t * f);
    for &i in indices {
        data.extend(features.index_axis(Axis(0), i).iter().copied());
    }
    Ok(Tensor::from_vec(data, (indices.len(), t, f), device)?)
}

/// Class indices predicted for `indices`, in batches
pub(crate) fn predict_indices(
    model: &SequenceClassifier,
    features: &Array3<f32>,
    indices: &[usize],
    batch_size: usize,
) -> Result<(Vec<u32>, Vec<f32>), TrainError> {
    let lie = LABEL_VOCABULARY.index_of(Label::Lie) as usize;
    let mut predicted = Vec::with_capacity(indices.len());
    let mut lie_scores = Vec::with_capacity(indices.len());
    for chunk in indices.chunks(batch_size.max(1)) {
        let xs = gather_features(features, chunk, model.device())?;
        let probs = model.probabilities(&xs)?.to_vec2::<f32>()?;
        for row in probs {
            let best = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i as u32)
                .unwrap_or(0);
            predicted.push(best);
            lie_scores.push(row.get(lie).copied().unwrap_or(0.0));
        }
    }
    Ok((predicted, lie_scores))
}

fn score_partition(
    model: &SequenceClassifier,
    data: &LabeledData,
    indices: &[usize],
    batch_size: usize,
) -> Result<(f64, f64), TrainError> {
    if indices.is_empty() {
        return Ok((0.0, 0.0));
    }
    let (predicted, _) = predict_indices(model, &data.features, indices, batch_size)?;
    let truth: Vec<u32> = indices.iter().map(|&i| data.labels[i]).collect();
    let positive = LABEL_VOCABULARY.index_of(Label::Lie);
    Ok((
        accuracy(&truth, &predicted),
        f1_score(&truth, &predicted, positive),
    ))
}

/// Train on a store and report validation/test scores
pub fn train_validate_test<P: AsRef<Path>>(
    store_path: P,
    options: &TrainOptions,
) -> Result<TrainOutcome, TrainError> {
    let device = parse_device(&options.device)?;
    let data = load_labeled_store(store_path.as_ref())?;
    let (total, _, feature_dim) = data.features.dim();

    let parts = split_indices(&data.labels, options.split, options.seed, options.stratify);
    if parts.train.is_empty() {
        let err = TrainError::EmptyPartition {
            partition: "train".to_string(),
            total,
        };
        log_train_error(&err, "train_validate_test");
        return Err(err);
    }
    log::info!(
        "[TrainingLoop] Split {} segments: train={}, val={}, test={}",
        total,
        parts.train.len(),
        parts.val.len(),
        parts.test.len()
    );

    // A checkpoint without the store's front end cannot be served consistently
    let checkpoint = match &options.checkpoint {
        Some(path) => match &data.front_end {
            Some(features) => Some((path, features)),
            None => {
                let err = TrainError::Dataset(DatasetError::Store {
                    reason: format!(
                        "{} records no build config; refusing to checkpoint without its feature front end",
                        store_path.as_ref().display()
                    ),
                });
                log_train_error(&err, "train_validate_test");
                return Err(err);
            }
        },
        None => None,
    };

    let config = build_model_config(feature_dim, options.variant, options.hyperparameters.as_ref());
    let model = SequenceClassifier::new(config.clone(), &device)?;
    let params = ParamsAdamW {
        lr: config.learning_rate,
        weight_decay: 0.0,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(model.varmap().all_vars(), params)?;

    let batch_size = options.batch_size.max(1);
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut order = parts.train.clone();
    let mut epoch_losses = Vec::with_capacity(options.epochs);
    for epoch in 0..options.epochs {
        order.shuffle(&mut rng);
        let mut loss_sum = 0.0f32;
        let mut batches = 0usize;
        for chunk in order.chunks(batch_size) {
            let xs = gather_features(&data.features, chunk, &device)?;
            let targets: Vec<u32> = chunk.iter().map(|&i| data.labels[i]).collect();
            let ys = Tensor::from_vec(targets, chunk.len(), &device)?;

            let logits = model.forward(&xs, true)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &ys)?;
            optimizer.backward_step(&loss)?;
            loss_sum += loss.to_scalar::<f32>()?;
            batches += 1;
        }
        let mean_loss = loss_sum / batches.max(1) as f32;
        log::info!(
            "[TrainingLoop] Epoch {}/{} | Loss: {:.4}",
            epoch + 1,
            options.epochs,
            mean_loss
        );
        epoch_losses.push(mean_loss);
    }

    let (val_acc, val_f1) = score_partition(&model, &data, &parts.val, batch_size)?;
    let (test_acc, test_f1) = score_partition(&model, &data, &parts.test, batch_size)?;
    let metrics = Metrics {
        val_acc,
        val_f1,
        test_acc,
        test_f1,
    };
    tracing::info!(
        val_acc = metrics.val_acc,
        val_f1 = metrics.val_f1,
        test_acc = metrics.test_acc,
        test_f1 = metrics.test_f1,
        "training finished"
    );

    if let Some((path, features)) = checkpoint {
        model.save(path, &data.stats, features)?;
    }

    Ok(TrainOutcome {
        metrics,
        epoch_losses,
        config,
        model: options.return_model.then_some(model),
    })
}

/// Write any serializable report as pretty JSON, creating parent folders
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<(), TrainError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_model_config_merges_overrides() {
        let rec = Recommendation {
            learning_rate: Some(0.005),
            hidden_size: Some(97.8),
            dropout: None,
        };
        let config = build_model_config(39, RecurrentVariant::Gru, Some(&rec));
        assert_eq!(config.input_size, 39);
        assert_eq!(config.hidden_size, 97, "hidden size is truncated");
        assert_eq!(config.learning_rate, 0.005);
        assert_eq!(config.dropout, 0.3, "missing fields keep defaults");
        assert_eq!(config.variant, RecurrentVariant::Gru);
    }

    #[test]
    fn test_build_model_config_without_advice() {
        let config = build_model_config(12, RecurrentVariant::Lstm, None);
        assert_eq!(config.hidden_size, 128);
        assert_eq!(config.learning_rate, 1e-3);
    }

    fn bare_store(dir: &Path) -> PathBuf {
        use crate::config::PreprocessConfig;
        use crate::dataset::{write_without_build_config, SegmentMeta, StoreContents};

        let n = 10;
        let contents = StoreContents {
            features: Array3::from_shape_fn((n, 3, 2), |(i, t, f)| {
                (i % 2) as f32 + 0.1 * t as f32 - 0.05 * f as f32
            }),
            segments: (0..n)
                .map(|i| SegmentMeta {
                    file_id: format!("clip{}.wav", i),
                    start_sample: 0,
                    end_sample: 16_000,
                    label: Some(if i % 2 == 0 { "lie" } else { "truth" }.to_string()),
                })
                .collect(),
            feature_mean: vec![0.0, 0.0],
            feature_std: vec![1.0, 1.0],
            config: PreprocessConfig::default(),
        };
        let path = dir.join("bare.safetensors");
        write_without_build_config(&path, &contents).unwrap();
        path
    }

    fn tiny_options() -> TrainOptions {
        TrainOptions {
            hyperparameters: Some(Recommendation {
                learning_rate: Some(1e-2),
                hidden_size: Some(4.0),
                dropout: Some(0.0),
            }),
            epochs: 1,
            batch_size: 4,
            ..TrainOptions::default()
        }
    }

    #[test]
    fn test_checkpoint_requires_recorded_front_end() {
        let dir = tempfile::tempdir().unwrap();
        let store = bare_store(dir.path());
        let weights = dir.path().join("model.safetensors");
        let options = TrainOptions {
            checkpoint: Some(weights.clone()),
            ..tiny_options()
        };

        match train_validate_test(&store, &options) {
            Err(TrainError::Dataset(DatasetError::Store { reason })) => {
                assert!(reason.contains("build config"), "reason: {}", reason)
            }
            Err(other) => panic!("Expected a store error, got {:?}", other),
            Ok(_) => panic!("Expected a store error, training succeeded"),
        }
        assert!(!weights.exists(), "no checkpoint with a default front end");
    }

    #[test]
    fn test_training_without_checkpoint_accepts_bare_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = bare_store(dir.path());
        let outcome = train_validate_test(&store, &tiny_options()).unwrap();
        assert_eq!(outcome.epoch_losses.len(), 1);
        assert_eq!(outcome.config.input_size, 2);
    }

    #[test]
    fn test_gather_features_preserves_row_order() {
        let features = Array3::from_shape_fn((4, 2, 3), |(n, t, f)| (n * 100 + t * 10 + f) as f32);
        let xs = gather_features(&features, &[2, 0], &Device::Cpu).unwrap();
        assert_eq!(xs.dims(), &[2, 2, 3]);
        let values = xs.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(values[0], 200.0);
        assert_eq!(values[6], 0.0);
    }
}
