//! End-to-end pipeline over a synthetic corpus
//!
//! Builds a tensor store from generated recordings, trains a small
//! classifier, evaluates the checkpoint and classifies single files.

mod common;

use std::fs;
use vocal_truth::analysis::features::MfccExtractor;
use vocal_truth::config::PreprocessConfig;
use vocal_truth::dataset::{
    apply_pre_emphasis, pad_or_trim, run_preprocessing, FeatureStats, TensorStore,
};
use vocal_truth::error::DatasetError;
use vocal_truth::fuzzy::Recommendation;
use vocal_truth::inference::{predict, ModelPredictor, Predictor};
use vocal_truth::model::{sidecar_path, RecurrentVariant};
use vocal_truth::training::{evaluate_model_on_store, train_validate_test, TrainOptions};
use vocal_truth::{load_audio, Label};

fn preprocess_config(root: &std::path::Path, corpus: &common::Corpus) -> PreprocessConfig {
    PreprocessConfig {
        input_folder: corpus.raw_dir.clone(),
        output_file: root.join("processed").join("features.safetensors"),
        metadata_csv: Some(corpus.labels_csv.clone()),
        segment_seconds: 1.0,
        hop_seconds: 1.0,
        ..PreprocessConfig::default()
    }
}

fn small_options(variant: RecurrentVariant, checkpoint: std::path::PathBuf) -> TrainOptions {
    TrainOptions {
        hyperparameters: Some(Recommendation {
            learning_rate: Some(5e-3),
            hidden_size: Some(16.0),
            dropout: Some(0.1),
        }),
        variant,
        epochs: 2,
        batch_size: 8,
        return_model: true,
        checkpoint: Some(checkpoint),
        ..TrainOptions::default()
    }
}

#[test]
fn test_store_build_shapes_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::write_corpus(dir.path());
    let config = preprocess_config(dir.path(), &corpus);

    let summary = run_preprocessing(&config).expect("preprocessing should succeed");
    assert_eq!(summary.files, 10);
    assert_eq!(summary.segments, 20, "two 1 s segments per 2 s file");
    assert_eq!(summary.time_steps, 59);
    assert_eq!(summary.feature_dim, 39);
    assert_eq!(summary.labeled_segments, 20);

    let store = TensorStore::open(&config.output_file).expect("store should open");
    assert_eq!(store.len(), 20);
    assert_eq!(store.time_steps(), 59);
    assert_eq!(store.feature_dim(), 39);
    assert_eq!(store.feature_mean(), summary.stats.mean.as_slice());
    assert_eq!(store.feature_std(), summary.stats.std.as_slice());
    assert!(store.feature_std().iter().all(|s| *s > 0.0));

    let labels = store.labels();
    assert_eq!(labels.iter().filter(|l| l.as_str() == "lie").count(), 10);
    assert_eq!(labels.iter().filter(|l| l.as_str() == "truth").count(), 10);

    let first = store.metadata(0).expect("segment 0 metadata");
    assert_eq!(first.file_id, "clip_00_lie.wav");
    assert_eq!((first.start_sample, first.end_sample), (0, 16_000));
    let second = store.metadata(1).expect("segment 1 metadata");
    assert_eq!((second.start_sample, second.end_sample), (16_000, 32_000));

    let built = store.build_config().expect("build config is stored");
    assert_eq!(built.features.n_mfcc, 13);
    assert_eq!(built.segment_seconds, 1.0);

    let features = store.features().unwrap();
    assert_eq!(features.dim(), (20, 59, 39));
    assert!(features.iter().all(|v| v.is_finite()));
    assert_eq!(store.segment(3).unwrap().dim(), (59, 39));

    // Segment 1 of the first file, rebuilt from the recording and the stored stats
    let signal = load_audio(&corpus.files[0], built.features.sample_rate).unwrap();
    let emphasized = apply_pre_emphasis(signal.samples(), built.features.pre_emphasis);
    let raw = MfccExtractor::new(&built.features).extract(&emphasized[16_000..32_000]);
    let stats = FeatureStats {
        mean: store.feature_mean().to_vec(),
        std: store.feature_std().to_vec(),
    };
    let recomputed = pad_or_trim(stats.normalize(&raw).unwrap(), store.time_steps());
    let stored = store.segment(1).unwrap();
    assert_eq!(stored.dim(), recomputed.dim());
    for ((t, f), value) in stored.indexed_iter() {
        let expected = recomputed[[t, f]];
        assert!(
            (value - expected).abs() <= 1e-3 * (1.0 + expected.abs()),
            "frame {} dim {}: stored {} vs recomputed {}",
            t,
            f,
            value,
            expected
        );
    }
}

#[test]
fn test_empty_corpus_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join("notes.txt"), "not audio").unwrap();

    let config = PreprocessConfig {
        input_folder: raw,
        output_file: dir.path().join("features.safetensors"),
        ..PreprocessConfig::default()
    };
    assert!(matches!(
        run_preprocessing(&config),
        Err(DatasetError::NoAudioFound { .. })
    ));
    assert!(!config.output_file.exists(), "no store on failure");
}

#[test]
fn test_train_evaluate_predict() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::write_corpus(dir.path());
    let config = preprocess_config(dir.path(), &corpus);
    run_preprocessing(&config).expect("preprocessing should succeed");

    let checkpoint = dir.path().join("models").join("classifier.safetensors");
    let outcome = train_validate_test(
        &config.output_file,
        &small_options(RecurrentVariant::Gru, checkpoint.clone()),
    )
        .expect("training should succeed");

    assert_eq!(outcome.epoch_losses.len(), 2);
    assert!(outcome.epoch_losses.iter().all(|l| l.is_finite()));
    assert_eq!(outcome.config.hidden_size, 16);
    assert_eq!(outcome.config.variant, RecurrentVariant::Gru);
    assert!(outcome.model.is_some());
    for score in [
        outcome.metrics.val_acc,
        outcome.metrics.val_f1,
        outcome.metrics.test_acc,
        outcome.metrics.test_f1,
    ] {
        assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
    }
    assert!(checkpoint.exists(), "weights written");
    assert!(sidecar_path(&checkpoint).exists(), "sidecar written");

    let report = evaluate_model_on_store(&checkpoint, &config.output_file, "cpu")
        .expect("evaluation should succeed");
    assert_eq!(report.segments, 20);
    assert_eq!(report.confusion.len(), 2);
    assert_eq!(report.confusion.iter().flatten().sum::<usize>(), 20);
    assert!((0.0..=1.0).contains(&report.accuracy));
    if let Some(auc) = report.roc_auc {
        assert!((0.0..=1.0).contains(&auc));
    }

    let (label, confidence) =
        predict(&corpus.files[0], &checkpoint, 0.5).expect("prediction should succeed");
    assert!(matches!(label, Label::Lie | Label::Truth));
    assert!((50.0..=100.0).contains(&confidence), "confidence {confidence}");

    let predictor = ModelPredictor::load(&checkpoint, "cpu", 0.5).unwrap();
    let bytes = fs::read(&corpus.files[1]).unwrap();
    let from_bytes = predictor.predict(&bytes).expect("bytes should classify");
    let from_file = predictor.predict_file(&corpus.files[1]).unwrap();
    assert_eq!(from_bytes.label, from_file.label);
    assert!((from_bytes.lie_probability - from_file.lie_probability).abs() < 1e-4);
}

#[test]
fn test_threshold_extremes_force_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::write_corpus(dir.path());
    let config = preprocess_config(dir.path(), &corpus);
    run_preprocessing(&config).unwrap();

    let checkpoint = dir.path().join("classifier.safetensors");
    let mut options = small_options(RecurrentVariant::Lstm, checkpoint.clone());
    options.epochs = 1;
    options.return_model = false;
    let outcome = train_validate_test(&config.output_file, &options).unwrap();
    assert!(outcome.model.is_none());

    assert_eq!(outcome.config.variant, RecurrentVariant::Lstm);

    let (always_lie, _) = predict(&corpus.files[2], &checkpoint, 0.0).unwrap();
    assert_eq!(always_lie, Label::Lie);
    let (never_lie, _) = predict(&corpus.files[2], &checkpoint, 1.01).unwrap();
    assert_eq!(never_lie, Label::Truth);
}

#[test]
fn test_predict_rejects_garbage_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = common::write_corpus(dir.path());
    let config = preprocess_config(dir.path(), &corpus);
    run_preprocessing(&config).unwrap();

    let checkpoint = dir.path().join("classifier.safetensors");
    let mut options = small_options(RecurrentVariant::BiLstm, checkpoint.clone());
    options.epochs = 1;
    train_validate_test(&config.output_file, &options).unwrap();

    let predictor = ModelPredictor::load(&checkpoint, "cpu", 0.5).unwrap();
    assert_eq!(predictor.meta().model.variant, RecurrentVariant::BiLstm);
    assert!(predictor.predict(b"definitely not audio").is_err());
}
