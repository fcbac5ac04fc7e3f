// Fuzzy module - hyperparameter advice from corpus prosody
//
// Architecture:
// - system: membership functions, rule base, Mamdani inference
// - mod.rs: prosody table reading, median aggregation, result document
//
// The advisor summarizes two prosody columns by their medians and maps
// them to (learning_rate, hidden_size, dropout) suggestions that the
// training loop accepts as overrides.

mod system;

pub use system::{nudge_into, recommend, Recommendation, Triangle, X1_RANGE, X2_RANGE};

use crate::config::{FuzzyConfig, TableFormat};
use crate::error::{log_advisor_error, AdvisorError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

/// Identifier written into every result document
pub const RESULT_NAME: &str = "fuzzy_sugeno";

/// Persisted advisor output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyResult {
    pub name: String,
    /// Clipped column medians, before the edge nudge
    pub inputs_used: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

impl FuzzyResult {
    /// Read a previously written result document
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AdvisorError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Read one numeric column from a CSV or JSON-records table
///
/// Empty, null, non-numeric and NaN cells read as 0.0.
pub fn read_column(path: &Path, column: &str) -> Result<Vec<f64>, AdvisorError> {
    let values = match TableFormat::from_path(path) {
        TableFormat::Csv => read_csv_column(path, column)?,
        TableFormat::Json => read_json_column(path, column)?,
    };
    if values.is_empty() {
        return Err(AdvisorError::EmptyTable {
            reason: format!("{} has no rows", path.display()),
        });
    }
    Ok(values)
}

fn parse_cell(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .unwrap_or(0.0)
}

fn read_csv_column(path: &Path, column: &str) -> Result<Vec<f64>, AdvisorError> {
    let mut reader = csv::Reader::from_path(path)?;
    let index = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| AdvisorError::MissingColumn {
            column: column.to_string(),
        })?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        values.push(record.get(index).map(parse_cell).unwrap_or(0.0));
    }
    Ok(values)
}

fn read_json_column(path: &Path, column: &str) -> Result<Vec<f64>, AdvisorError> {
    let reader = BufReader::new(File::open(path)?);
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_reader(reader)?;
    if !rows.is_empty() && rows.iter().all(|row| !row.contains_key(column)) {
        return Err(AdvisorError::MissingColumn {
            column: column.to_string(),
        });
    }

    Ok(rows
        .iter()
        .map(|row| match row.get(column) {
            Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| !v.is_nan()).unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => parse_cell(s),
            _ => 0.0,
        })
        .collect())
}

/// Median (mean of the two middle values for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Summarize the prosody table, run inference and write the result JSON
pub fn run_fuzzy_optimization(config: &FuzzyConfig) -> Result<FuzzyResult, AdvisorError> {
    let (x1_name, x2_name) = &config.feature_inputs;
    let column = |name: &str| {
        read_column(&config.features_file, name).map_err(|err| {
            log_advisor_error(&err, "run_fuzzy_optimization");
            err
        })
    };
    let x1 = median(&column(x1_name)?)
        .unwrap_or(0.0)
        .clamp(X1_RANGE.0, X1_RANGE.1);
    let x2 = median(&column(x2_name)?)
        .unwrap_or(0.0)
        .clamp(X2_RANGE.0, X2_RANGE.1);
    log::info!(
        "[FuzzyAdvisor] Inputs: {}={:.4}, {}={:.4}",
        x1_name,
        x1,
        x2_name,
        x2
    );

    let recommendation = recommend(x1, x2, &config.space);
    let mut inputs_used = BTreeMap::new();
    inputs_used.insert(x1_name.clone(), x1);
    inputs_used.insert(x2_name.clone(), x2);
    let result = FuzzyResult {
        name: RESULT_NAME.to_string(),
        inputs_used,
        recommendation,
    };

    if let Some(parent) = config.output_json.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&config.output_json, serde_json::to_string_pretty(&result)?)?;
    tracing::info!(
        learning_rate = ?result.recommendation.learning_rate,
        hidden_size = ?result.recommendation.hidden_size,
        dropout = ?result.recommendation.dropout,
        validation_target = config.validation_target,
        "hyperparameter advice written"
    );
    Ok(result)
}
