// Prosody extraction run
//
// Walks a corpus, computes global F0, tonal and stress descriptors per file
// and writes them as a flat table (CSV or JSON records). The table is the
// input of the fuzzy hyperparameter advisor.

use crate::analysis::features::ProsodyAnalyzer;
use crate::audio::load_audio;
use crate::config::{ProsodyConfig, TableFormat};
use crate::dataset::{find_audio_files, DEFAULT_EXTENSIONS};
use crate::error::{log_audio_error, DatasetError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// One row of the prosody table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProsodyRecord {
    pub file_id: String,
    pub f0_median: f32,
    pub tonal_rise_ratio: f32,
    pub tonal_fall_ratio: f32,
    pub tonal_stable_ratio: f32,
    pub stress_zcr_mean: f32,
    pub stress_zcr_std: f32,
    pub stress_energy_cv: f32,
    pub label: Option<String>,
}

/// Infer a label from a file name: "lie" wins over "truth"
pub fn label_from_filename(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.contains("lie") {
        Some("lie")
    } else if lower.contains("truth") {
        Some("truth")
    } else {
        None
    }
}

/// Extract prosody descriptors for every audio file under `config.input_folder`
///
/// Any file that fails to load aborts the run; nothing is written then.
pub fn run_prosody_extraction(config: &ProsodyConfig) -> Result<Vec<ProsodyRecord>, DatasetError> {
    let files = find_audio_files(&config.input_folder, DEFAULT_EXTENSIONS)?;
    let analyzer = ProsodyAnalyzer::new(config.pitch.clone());

    let mut records = Vec::with_capacity(files.len());
    for (idx, path) in files.iter().enumerate() {
        let signal = load_audio(path, config.pitch.sample_rate).map_err(|err| {
            log_audio_error(&err, "run_prosody_extraction");
            err
        })?;
        let features = analyzer.analyze(signal.samples());

        let file_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!(
            "[Prosody] {}/{} {}: f0={:.1} Hz, stable={:.3}, energy_cv={:.3}",
            idx + 1,
            files.len(),
            file_id,
            features.f0_median,
            features.tonal.stable_ratio,
            features.stress.energy_cv
        );

        records.push(ProsodyRecord {
            label: label_from_filename(&file_id).map(str::to_string),
            file_id,
            f0_median: features.f0_median,
            tonal_rise_ratio: features.tonal.rise_ratio,
            tonal_fall_ratio: features.tonal.fall_ratio,
            tonal_stable_ratio: features.tonal.stable_ratio,
            stress_zcr_mean: features.stress.zcr_mean,
            stress_zcr_std: features.stress.zcr_std,
            stress_energy_cv: features.stress.energy_cv,
        });
    }

    write_table(&records, &config.output_file, config.format)?;
    tracing::info!(
        files = records.len(),
        output = %config.output_file.display(),
        "prosody table written"
    );
    Ok(records)
}

/// Write records as CSV or as a JSON array of objects
pub fn write_table(
    records: &[ProsodyRecord],
    path: &Path,
    format: TableFormat,
) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match format {
        TableFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        TableFormat::Json => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, records)?;
        }
    }
    Ok(())
}
