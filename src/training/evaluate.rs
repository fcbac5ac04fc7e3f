// Checkpoint evaluation over a whole tensor store

use super::metrics::{accuracy, confusion_matrix, macro_scores, roc_auc};
use super::{load_labeled_store, predict_indices, write_report};
use crate::dataset::{Label, LABEL_VOCABULARY};
use crate::error::TrainError;
use crate::model::{parse_device, SequenceClassifier};
use serde::{Deserialize, Serialize};
use std::path::Path;

const EVAL_BATCH: usize = 64;

/// Scores of a checkpoint on every segment of a store
///
/// Precision, recall and F1 are macro averages over both classes; ROC AUC
/// ranks segments by p(lie) and is `None` when one class is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: Option<f64>,
    /// counts[true][predicted], rows and columns in label-index order
    pub confusion: Vec<Vec<usize>>,
    pub segments: usize,
}

impl EvaluationReport {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TrainError> {
        write_report(path.as_ref(), self)
    }
}

/// Load a checkpoint and score it against every labeled segment of a store
pub fn evaluate_model_on_store<P: AsRef<Path>, Q: AsRef<Path>>(
    model_path: P,
    store_path: Q,
    device: &str,
) -> Result<EvaluationReport, TrainError> {
    let device = parse_device(device)?;
    let (model, _) = SequenceClassifier::load(model_path, &device)?;
    let data = load_labeled_store(store_path.as_ref())?;

    let indices: Vec<usize> = (0..data.labels.len()).collect();
    let (predicted, lie_scores) = predict_indices(&model, &data.features, &indices, EVAL_BATCH)?;
    let classes = LABEL_VOCABULARY.len();
    let (precision, recall, f1) = macro_scores(&data.labels, &predicted, classes);
    let report = EvaluationReport {
        accuracy: accuracy(&data.labels, &predicted),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(
            &data.labels,
            &lie_scores,
            LABEL_VOCABULARY.index_of(Label::Lie),
        ),
        confusion: confusion_matrix(&data.labels, &predicted, classes),
        segments: indices.len(),
    };

    tracing::info!(
        accuracy = report.accuracy,
        f1 = report.f1,
        roc_auc = ?report.roc_auc,
        segments = report.segments,
        "evaluation finished"
    );
    Ok(report)
}
