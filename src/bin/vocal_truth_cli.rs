use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use vocal_truth::analysis::run_prosody_extraction;
use vocal_truth::config::{AppConfig, TableFormat};
use vocal_truth::fuzzy::{run_fuzzy_optimization, FuzzyResult};
use vocal_truth::inference::{ModelPredictor, DEFAULT_THRESHOLD};
use vocal_truth::model::RecurrentVariant;
use vocal_truth::training::{evaluate_model_on_store, train_validate_test, write_report, TrainOptions};
use vocal_truth::{init_logging, run_preprocessing};

#[derive(Parser, Debug)]
#[command(
    name = "vocal_truth_cli",
    about = "Build feature stores, advise hyperparameters, train and run the speech deception classifier"
)]
struct Cli {
    /// JSON configuration file (missing sections fall back to defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment a corpus, extract MFCC+deltas and write a tensor store
    Preprocess {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// CSV side-table with filepath,label columns
        #[arg(long)]
        labels: Option<PathBuf>,
        #[arg(long)]
        segment_seconds: Option<f32>,
        #[arg(long)]
        hop_seconds: Option<f32>,
        /// Keep a trailing segment shorter than segment_seconds
        #[arg(long)]
        keep_last: bool,
    },
    /// Write per-file pitch, tonal and stress descriptors
    Prosody {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Destination table (.csv or .json)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the fuzzy advisor over a prosody table
    Advise {
        #[arg(long)]
        features: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Train, validate and test a classifier on a tensor store
    Train {
        #[arg(long)]
        store: PathBuf,
        /// lstm, bilstm or gru
        #[arg(long)]
        variant: Option<RecurrentVariant>,
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        stratify: bool,
        /// Advisor result JSON whose values override the defaults
        #[arg(long)]
        fuzzy: Option<PathBuf>,
        /// Save the trained weights here (sidecar JSON written alongside)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
        /// Write the metrics JSON here instead of stdout
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
    /// Score a checkpoint on every segment of a tensor store
    Evaluate {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        store: PathBuf,
        #[arg(long, default_value = "cpu")]
        device: String,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Classify one recording
    Predict {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long, default_value = "cpu")]
        device: String,
    },
}

fn main() -> ExitCode {
    init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Preprocess {
            input,
            output,
            labels,
            segment_seconds,
            hop_seconds,
            keep_last,
        } => {
            let mut pre = config.preprocess;
            if let Some(input) = input {
                pre.input_folder = input;
            }
            if let Some(output) = output {
                pre.output_file = output;
            }
            if labels.is_some() {
                pre.metadata_csv = labels;
            }
            if let Some(seconds) = segment_seconds {
                pre.segment_seconds = seconds;
            }
            if let Some(seconds) = hop_seconds {
                pre.hop_seconds = seconds;
            }
            if keep_last {
                pre.drop_last = false;
            }
            let summary = run_preprocessing(&pre)
                .with_context(|| format!("building store from {}", pre.input_folder.display()))?;
            emit_json(&summary)?;
        }
        Commands::Prosody { input, output } => {
            let mut prosody = config.prosody;
            if let Some(input) = input {
                prosody.input_folder = input;
            }
            if let Some(output) = output {
                prosody.format = TableFormat::from_path(&output);
                prosody.output_file = output;
            }
            let records = run_prosody_extraction(&prosody).with_context(|| {
                format!("extracting prosody from {}", prosody.input_folder.display())
            })?;
            println!(
                "{} records written to {}",
                records.len(),
                prosody.output_file.display()
            );
        }
        Commands::Advise { features, output } => {
            let mut fuzzy = config.fuzzy;
            if let Some(features) = features {
                fuzzy.features_file = features;
            }
            if let Some(output) = output {
                fuzzy.output_json = output;
            }
            let result = run_fuzzy_optimization(&fuzzy)
                .with_context(|| format!("advising from {}", fuzzy.features_file.display()))?;
            emit_json(&result)?;
        }
        Commands::Train {
            store,
            variant,
            device,
            epochs,
            batch_size,
            seed,
            stratify,
            fuzzy,
            checkpoint,
            metrics,
        } => {
            let mut options = TrainOptions::from_defaults(&config.training);
            if let Some(variant) = variant {
                options.variant = variant;
            }
            if let Some(device) = device {
                options.device = device;
            }
            if let Some(epochs) = epochs {
                options.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                options.batch_size = batch_size;
            }
            if let Some(seed) = seed {
                options.seed = seed;
            }
            options.stratify |= stratify;
            options.checkpoint = checkpoint;
            if let Some(path) = fuzzy {
                let advice = FuzzyResult::load(&path)
                    .with_context(|| format!("reading advice {}", path.display()))?;
                options.hyperparameters = Some(advice.recommendation);
            }

            let outcome = train_validate_test(&store, &options)
                .with_context(|| format!("training on {}", store.display()))?;
            let report = TrainReport {
                metrics: outcome.metrics,
                epoch_losses: &outcome.epoch_losses,
                hidden_size: outcome.config.hidden_size,
                learning_rate: outcome.config.learning_rate,
                dropout: outcome.config.dropout,
                variant: outcome.config.variant,
            };
            match metrics {
                Some(path) => write_report(&path, &report)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => emit_json(&report)?,
            }
        }
        Commands::Evaluate {
            model,
            store,
            device,
            report,
        } => {
            let evaluation = evaluate_model_on_store(&model, &store, &device)
                .with_context(|| format!("evaluating {}", model.display()))?;
            if let Some(path) = &report {
                evaluation
                    .save(path)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            emit_json(&evaluation)?;
        }
        Commands::Predict {
            model,
            input,
            threshold,
            device,
        } => {
            let threshold = threshold.unwrap_or(config.training.threshold);
            let threshold = if threshold.is_finite() {
                threshold
            } else {
                DEFAULT_THRESHOLD
            };
            let predictor = ModelPredictor::load(&model, &device, threshold)
                .with_context(|| format!("loading {}", model.display()))?;
            let verdict = predictor
                .predict_file(&input)
                .with_context(|| format!("classifying {}", input.display()))?;
            emit_json(&verdict)?;
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct TrainReport<'a> {
    #[serde(flatten)]
    metrics: vocal_truth::Metrics,
    epoch_losses: &'a [f32],
    hidden_size: usize,
    learning_rate: f64,
    dropout: f32,
    variant: RecurrentVariant,
}
