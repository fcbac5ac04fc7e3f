//! Configuration management for corpus preprocessing, prosody extraction,
//! hyperparameter advice and training
//!
//! Every stage of the pipeline reads its parameters from one section of
//! [`AppConfig`]. The whole document can be loaded from a JSON file so that
//! experiments can be repeated without recompilation; missing sections and
//! missing fields fall back to their defaults.

use crate::analysis::frames::WindowKind;
use crate::error::DatasetError;
use crate::model::RecurrentVariant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Canonical sample rate of every signal entering the pipeline
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preprocess: PreprocessConfig,
    pub prosody: ProsodyConfig,
    pub fuzzy: FuzzyConfig,
    pub training: TrainingDefaults,
}

/// MFCC(+delta+delta-delta) extraction parameters
///
/// Shared by the dataset builder and by inference; a checkpoint stores the
/// copy it was trained with so both paths compute identical features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Pre-emphasis coefficient (y[t] = x[t] - a * x[t-1])
    pub pre_emphasis: f32,
    /// Number of cepstral coefficients kept after the DCT
    pub n_mfcc: usize,
    /// STFT size in samples
    pub n_fft: usize,
    /// STFT hop in samples; `None` means n_fft / 4
    pub hop_length: Option<usize>,
    /// Analysis window applied to every STFT frame
    pub window: WindowKind,
    /// Number of mel bands
    pub n_mels: usize,
    /// Lowest mel band edge in Hz
    pub fmin: f32,
    /// Highest mel band edge in Hz; `None` means Nyquist
    pub fmax: Option<f32>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            pre_emphasis: 0.97,
            n_mfcc: 13,
            n_fft: 1024,
            hop_length: None,
            window: WindowKind::Hann,
            n_mels: 64,
            fmin: 20.0,
            fmax: None,
        }
    }
}

impl FeatureConfig {
    /// Effective STFT hop
    pub fn hop(&self) -> usize {
        self.hop_length.unwrap_or(self.n_fft / 4).max(1)
    }

    /// Effective upper mel edge
    pub fn fmax(&self) -> f32 {
        self.fmax.unwrap_or(self.sample_rate as f32 / 2.0)
    }

    /// Width of one feature row: static + delta + delta-delta
    pub fn feature_dim(&self) -> usize {
        self.n_mfcc * 3
    }
}

/// Dataset builder parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Root folder scanned recursively for audio
    pub input_folder: PathBuf,
    /// Tensor store destination
    pub output_file: PathBuf,
    /// Optional `filepath,label` side-table
    pub metadata_csv: Option<PathBuf>,
    /// Extensions accepted by the scan (case-insensitive, leading dot)
    pub allowed_extensions: Vec<String>,
    /// Segment duration in seconds
    pub segment_seconds: f32,
    /// Stride between segment starts in seconds (< segment_seconds overlaps)
    pub hop_seconds: f32,
    /// Drop a trailing segment shorter than segment_seconds
    pub drop_last: bool,
    /// Recorded in the store for reproducibility
    pub seed: u64,
    pub features: FeatureConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("data/raw"),
            output_file: PathBuf::from("data/processed/features.safetensors"),
            metadata_csv: None,
            allowed_extensions: [".wav", ".flac", ".mp3", ".m4a", ".ogg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            segment_seconds: 1.0,
            hop_seconds: 1.0,
            drop_last: true,
            seed: 42,
            features: FeatureConfig::default(),
        }
    }
}

impl PreprocessConfig {
    /// Segment length in samples at the configured rate
    pub fn segment_samples(&self) -> usize {
        seconds_to_samples(self.segment_seconds, self.features.sample_rate)
    }

    /// Segment stride in samples at the configured rate
    pub fn hop_samples(&self) -> usize {
        seconds_to_samples(self.hop_seconds, self.features.sample_rate)
    }

    /// Reject configurations that cannot produce a well-formed store
    pub fn validate(&self) -> Result<(), DatasetError> {
        let invalid = |reason: &str| {
            Err(DatasetError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.features.sample_rate == 0 {
            return invalid("sample_rate must be > 0");
        }
        if self.segment_seconds <= 0.0 || self.hop_seconds <= 0.0 {
            return invalid("segment_seconds and hop_seconds must be > 0");
        }
        if self.segment_samples() == 0 || self.hop_samples() == 0 {
            return invalid("segment and hop must span at least one sample");
        }
        if self.features.n_fft < 2 || self.features.n_mfcc == 0 {
            return invalid("n_fft must be >= 2 and n_mfcc must be > 0");
        }
        if self.features.n_mfcc > self.features.n_mels {
            return invalid("n_mfcc cannot exceed n_mels");
        }
        if self.features.fmin < 0.0 || self.features.fmin >= self.features.fmax() {
            return invalid("fmin must lie in [0, fmax)");
        }
        if self.allowed_extensions.is_empty() {
            return invalid("allowed_extensions is empty");
        }
        Ok(())
    }
}

/// Convert a duration to a sample count (rounded to nearest)
pub fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    (seconds as f64 * sample_rate as f64).round().max(0.0) as usize
}

/// Pitch, tonal and stress analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub sample_rate: u32,
    /// Analysis frame length in milliseconds
    pub frame_ms: f32,
    /// Frame stride in milliseconds
    pub hop_ms: f32,
    pub window: WindowKind,
    /// Lowest admissible F0 in Hz
    pub fmin: f32,
    /// Highest admissible F0 in Hz
    pub fmax: f32,
    /// YIN absolute threshold on the normalized difference
    pub yin_threshold: f32,
    /// Pitch change (Hz) separating rises/falls from stable steps
    pub tonal_delta_hz: f32,
    /// Floor inside the RMS square root
    pub energy_eps: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_ms: 25.0,
            hop_ms: 10.0,
            window: WindowKind::Hann,
            fmin: 50.0,
            fmax: 500.0,
            yin_threshold: 0.1,
            tonal_delta_hz: 5.0,
            energy_eps: 1e-8,
        }
    }
}

impl PitchConfig {
    /// (frame, hop) in samples
    pub fn frame_and_hop(&self) -> (usize, usize) {
        let frame = seconds_to_samples(self.frame_ms / 1000.0, self.sample_rate).max(1);
        let hop = seconds_to_samples(self.hop_ms / 1000.0, self.sample_rate).max(1);
        (frame, hop)
    }
}

/// Output table encoding for the prosody run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    /// Infer the format from a file extension (anything but `.json` is CSV)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TableFormat::Json,
            _ => TableFormat::Csv,
        }
    }
}

/// Per-file prosody extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProsodyConfig {
    pub input_folder: PathBuf,
    pub output_file: PathBuf,
    pub format: TableFormat,
    pub pitch: PitchConfig,
}

impl Default for ProsodyConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("data/raw"),
            output_file: PathBuf::from("data/processed/prosody.csv"),
            format: TableFormat::Csv,
            pitch: PitchConfig::default(),
        }
    }
}

/// Ranges searched by the fuzzy advisor (min, max)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperparameterSpace {
    pub learning_rate: (f64, f64),
    pub hidden_size: (f64, f64),
    pub dropout: (f64, f64),
}

impl Default for HyperparameterSpace {
    fn default() -> Self {
        Self {
            learning_rate: (1e-4, 1e-2),
            hidden_size: (32.0, 256.0),
            dropout: (0.0, 0.6),
        }
    }
}

/// Fuzzy advisor run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Prosody table (CSV or JSON records)
    pub features_file: PathBuf,
    /// Recommendation document destination
    pub output_json: PathBuf,
    pub space: HyperparameterSpace,
    /// Columns feeding (stable_ratio, energy_cv)
    pub feature_inputs: (String, String),
    /// Accuracy a downstream trainer should reach to accept the advice
    pub validation_target: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            features_file: PathBuf::from("data/processed/prosody.csv"),
            output_json: PathBuf::from("data/processed/fuzzy_params.json"),
            space: HyperparameterSpace::default(),
            feature_inputs: (
                "tonal_stable_ratio".to_string(),
                "stress_energy_cv".to_string(),
            ),
            validation_target: 0.7,
        }
    }
}

/// Training loop defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingDefaults {
    pub variant: RecurrentVariant,
    /// "cpu", "cuda", "cuda:N" or "metal"
    pub device: String,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
    /// Stratify partitions by label instead of a plain permutation
    pub stratify: bool,
    /// Decision threshold on p(lie) at inference
    pub threshold: f32,
}

impl Default for TrainingDefaults {
    fn default() -> Self {
        Self {
            variant: RecurrentVariant::Lstm,
            device: "cpu".to_string(),
            epochs: 20,
            batch_size: 64,
            seed: 42,
            stratify: false,
            threshold: 0.5,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults when the file is missing
    /// or is not valid JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.preprocess.features.sample_rate, 16_000);
        assert_eq!(config.preprocess.features.hop(), 256);
        assert_eq!(config.preprocess.features.feature_dim(), 39);
        assert_eq!(config.preprocess.segment_samples(), 16_000);
        assert_eq!(config.prosody.pitch.frame_and_hop(), (400, 160));
        assert_eq!(config.training.epochs, 20);
        assert_eq!(config.fuzzy.space.hidden_size, (32.0, 256.0));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.preprocess, config.preprocess);
        assert_eq!(parsed.fuzzy, config.fuzzy);
        assert_eq!(parsed.training, config.training);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "preprocess": { "segment_seconds": 2.0, "features": { "window": "hamming" } } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.preprocess.segment_seconds, 2.0);
        assert_eq!(parsed.preprocess.features.window, WindowKind::Hamming);
        assert_eq!(parsed.preprocess.features.n_mfcc, 13);
        assert_eq!(parsed.training.batch_size, 64);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/definitely/not/here.json");
        assert_eq!(config.preprocess, PreprocessConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PreprocessConfig::default();
        assert!(config.validate().is_ok());

        config.segment_seconds = 0.0;
        assert!(config.validate().is_err());

        let mut config = PreprocessConfig::default();
        config.features.n_mfcc = 80;
        assert!(config.validate().is_err(), "n_mfcc above n_mels must fail");
    }

    #[test]
    fn test_table_format_from_path() {
        assert_eq!(TableFormat::from_path(Path::new("a.JSON")), TableFormat::Json);
        assert_eq!(TableFormat::from_path(Path::new("a.csv")), TableFormat::Csv);
    }
}
