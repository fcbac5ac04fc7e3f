// Dataset module - corpus to tensor store
//
// Architecture:
// - labels: closed label vocabulary and the `filepath,label` side-table
// - store: safetensors tensor store (write once, memory-mapped reads)
// - mod.rs: corpus scan, segmentation, feature statistics, build driver
//
// Build order per corpus:
// scan -> load/resample -> pre-emphasis -> segment -> MFCC(+deltas)
// -> stats -> normalize -> pad/trim -> write. Any failure aborts the run
// before the store is written.

mod labels;
mod store;

pub use labels::{
    encode_label, encode_labels, read_label_table, Label, LabelVocabulary, LABEL_VOCABULARY,
};
pub use store::{flatten_config, SegmentMeta, StoreContents, TensorStore};
#[cfg(test)]
pub(crate) use store::write_without_build_config;

use crate::analysis::features::MfccExtractor;
use crate::audio::load_audio;
use crate::config::PreprocessConfig;
use crate::error::{log_audio_error, log_dataset_error, DatasetError};
use ndarray::{s, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions accepted when no explicit list is configured
pub const DEFAULT_EXTENSIONS: &[&str] = &[".wav", ".flac", ".mp3", ".m4a", ".ogg"];

/// Variance floor applied before the square root
const VARIANCE_FLOOR: f64 = 1e-12;

/// Recursively collect files whose extension matches `extensions`
///
/// Extensions are compared case-insensitively, with or without the leading
/// dot. The result is sorted so corpus order is deterministic.
pub fn find_audio_files<P: AsRef<Path>, S: AsRef<str>>(
    folder: P,
    extensions: &[S],
) -> Result<Vec<PathBuf>, DatasetError> {
    let folder = folder.as_ref();
    let wanted: Vec<String> = extensions
        .iter()
        .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();
    if folder.is_dir() {
        collect_files(folder, &wanted, &mut files)?;
    }
    files.sort();

    if files.is_empty() {
        return Err(DatasetError::NoAudioFound {
            folder: folder.display().to_string(),
        });
    }
    Ok(files)
}

fn collect_files(dir: &Path, wanted: &[String], out: &mut Vec<PathBuf>) -> Result<(), DatasetError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, wanted, out)?;
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| wanted.iter().any(|w| w.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if matches {
            out.push(path);
        }
    }
    Ok(())
}

/// First-order pre-emphasis: y[0] = x[0], y[t] = x[t] - coef * x[t-1]
pub fn apply_pre_emphasis(signal: &[f32], coef: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(signal.len());
    if let Some(&first) = signal.first() {
        out.push(first);
    }
    out.extend(signal.windows(2).map(|w| w[1] - coef * w[0]));
    out
}

/// Segment boundaries `[start, end)` over a signal of `len` samples
///
/// With `drop_last` only full-length segments are produced; otherwise the
/// trailing segment is clipped to the signal end. Starts at or past the end
/// never produce a segment.
pub fn segment_signal(
    len: usize,
    segment_len: usize,
    hop_len: usize,
    drop_last: bool,
) -> Vec<(usize, usize)> {
    if segment_len == 0 || hop_len == 0 || len == 0 {
        return Vec::new();
    }
    let last_start = if drop_last {
        match len.checked_sub(segment_len) {
            Some(v) => v,
            None => return Vec::new(),
        }
    } else {
        len - 1
    };

    (0..=last_start)
        .step_by(hop_len)
        .map(|start| (start, (start + segment_len).min(len)))
        .collect()
}

/// Analytic frame count every stored segment is padded or trimmed to
pub fn expected_frames(segment_len: usize, n_fft: usize, hop: usize) -> usize {
    let hop = hop.max(1);
    if segment_len >= n_fft {
        1 + (segment_len - n_fft) / hop
    } else {
        (segment_len / hop).max(1)
    }
}

/// Zero-pad (at the end) or truncate a (T x F) array to `target` rows
pub fn pad_or_trim(features: Array2<f32>, target: usize) -> Array2<f32> {
    let (rows, cols) = features.dim();
    if rows == target {
        return features;
    }
    if rows > target {
        return features.slice(s![..target, ..]).to_owned();
    }
    let mut out = Array2::zeros((target, cols));
    out.slice_mut(s![..rows, ..]).assign(&features);
    out
}

/// Per-dimension corpus statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureStats {
    pub fn feature_dim(&self) -> usize {
        self.mean.len()
    }

    /// (x - mean) / std applied row by row
    pub fn normalize(&self, features: &Array2<f32>) -> Result<Array2<f32>, DatasetError> {
        if features.ncols() != self.mean.len() {
            return Err(DatasetError::ShapeMismatch {
                reason: format!(
                    "features have {} columns, stats have {}",
                    features.ncols(),
                    self.mean.len()
                ),
            });
        }
        let mut out = features.clone();
        for mut row in out.rows_mut() {
            for ((x, m), s) in row.iter_mut().zip(&self.mean).zip(&self.std) {
                *x = (*x - m) / s;
            }
        }
        Ok(out)
    }
}

/// Mean and std per feature dimension over every frame of every segment
///
/// Sums are accumulated in f64 so the result does not depend on order.
pub fn compute_feature_stats(features: &[Array2<f32>]) -> Result<FeatureStats, DatasetError> {
    let first = features.first().ok_or_else(|| DatasetError::ShapeMismatch {
        reason: "no feature arrays to compute statistics over".to_string(),
    })?;
    let dim = first.ncols();
    if dim == 0 {
        return Err(DatasetError::ShapeMismatch {
            reason: "feature arrays have zero columns".to_string(),
        });
    }

    let mut sum = vec![0.0f64; dim];
    let mut sum_sq = vec![0.0f64; dim];
    let mut count = 0usize;
    for (idx, array) in features.iter().enumerate() {
        if array.ncols() != dim {
            return Err(DatasetError::ShapeMismatch {
                reason: format!(
                    "array {} has {} columns, expected {}",
                    idx,
                    array.ncols(),
                    dim
                ),
            });
        }
        for row in array.rows() {
            for (d, &x) in row.iter().enumerate() {
                let x = x as f64;
                sum[d] += x;
                sum_sq[d] += x * x;
            }
        }
        count += array.nrows();
    }
    if count == 0 {
        return Err(DatasetError::ShapeMismatch {
            reason: "feature arrays contain no frames".to_string(),
        });
    }

    let n = count as f64;
    let mut mean = Vec::with_capacity(dim);
    let mut std = Vec::with_capacity(dim);
    for d in 0..dim {
        let m = sum[d] / n;
        let var = (sum_sq[d] / n - m * m).max(VARIANCE_FLOOR);
        mean.push(m as f32);
        std.push(var.sqrt() as f32);
    }
    Ok(FeatureStats { mean, std })
}

/// Normalize every array with shared statistics
pub fn normalize_feature_list(
    features: &[Array2<f32>],
    stats: &FeatureStats,
) -> Result<Vec<Array2<f32>>, DatasetError> {
    features.iter().map(|f| stats.normalize(f)).collect()
}

/// Outcome of a successful store build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    pub output_file: PathBuf,
    pub files: usize,
    pub segments: usize,
    pub time_steps: usize,
    pub feature_dim: usize,
    pub labeled_segments: usize,
    pub stats: FeatureStats,
}

/// Build a tensor store from the corpus described by `config`
pub fn run_preprocessing(config: &PreprocessConfig) -> Result<BuildSummary, DatasetError> {
    config.validate()?;
    let files = find_audio_files(&config.input_folder, &config.allowed_extensions)?;
    let labels: HashMap<String, String> = match &config.metadata_csv {
        Some(path) => read_label_table(path)?,
        None => HashMap::new(),
    };
    log::info!(
        "[DatasetBuilder] {} files under {}, {} labels",
        files.len(),
        config.input_folder.display(),
        labels.len()
    );

    let feature_config = &config.features;
    let extractor = MfccExtractor::new(feature_config);
    let segment_len = config.segment_samples();
    let hop_len = config.hop_samples();

    let mut raw_features: Vec<Array2<f32>> = Vec::new();
    let mut segments: Vec<SegmentMeta> = Vec::new();
    for (idx, path) in files.iter().enumerate() {
        let signal = load_audio(path, feature_config.sample_rate).map_err(|err| {
            log_audio_error(&err, "run_preprocessing");
            err
        })?;
        let emphasized = apply_pre_emphasis(signal.samples(), feature_config.pre_emphasis);
        let file_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let label = labels.get(&file_id).cloned();

        let bounds = segment_signal(emphasized.len(), segment_len, hop_len, config.drop_last);
        log::debug!(
            "[DatasetBuilder] {}/{} {}: {:.2}s, {} segments",
            idx + 1,
            files.len(),
            file_id,
            signal.duration(),
            bounds.len()
        );
        for (start, end) in bounds {
            raw_features.push(extractor.extract(&emphasized[start..end]));
            segments.push(SegmentMeta {
                file_id: file_id.clone(),
                start_sample: start as i64,
                end_sample: end as i64,
                label: label.clone(),
            });
        }
    }

    let expected_dim = extractor.feature_dim();
    for (segment, features) in raw_features.iter().enumerate() {
        if features.ncols() != expected_dim {
            return Err(DatasetError::InconsistentFeatureDim {
                segment,
                expected: expected_dim,
                found: features.ncols(),
            });
        }
    }

    let stats = compute_feature_stats(&raw_features)?;
    log::info!(
        "[DatasetBuilder] Corpus statistics over {} segments: mean[0]={:.3}, std[0]={:.3}",
        raw_features.len(),
        stats.mean[0],
        stats.std[0]
    );
    let normalized = normalize_feature_list(&raw_features, &stats)?;

    let target = expected_frames(segment_len, feature_config.n_fft, feature_config.hop());
    let mut stacked = Array3::<f32>::zeros((normalized.len(), target, expected_dim));
    for (i, features) in normalized.into_iter().enumerate() {
        stacked
            .index_axis_mut(Axis(0), i)
            .assign(&pad_or_trim(features, target));
    }

    let labeled_segments = segments.iter().filter(|s| s.label.is_some()).count();
    let contents = StoreContents {
        features: stacked,
        segments,
        feature_mean: stats.mean.clone(),
        feature_std: stats.std.clone(),
        config: config.clone(),
    };
    TensorStore::write(&config.output_file, &contents).map_err(|err| {
        log_dataset_error(&err, "run_preprocessing");
        err
    })?;

    let summary = BuildSummary {
        output_file: config.output_file.clone(),
        files: files.len(),
        segments: contents.segments.len(),
        time_steps: target,
        feature_dim: expected_dim,
        labeled_segments,
        stats,
    };
    tracing::info!(
        files = summary.files,
        segments = summary.segments,
        time_steps = summary.time_steps,
        feature_dim = summary.feature_dim,
        "tensor store built"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pre_emphasis() {
        let y = apply_pre_emphasis(&[1.0, 2.0, 3.0], 0.5);
        assert_eq!(y, vec![1.0, 1.5, 2.0]);
        assert!(apply_pre_emphasis(&[], 0.97).is_empty());
    }

    #[test]
    fn test_segment_signal_drop_last() {
        assert_eq!(
            segment_signal(35, 10, 10, true),
            vec![(0, 10), (10, 20), (20, 30)]
        );
        assert!(segment_signal(5, 10, 10, true).is_empty());
        assert_eq!(segment_signal(20, 10, 5, true).len(), 3);
    }

    #[test]
    fn test_segment_signal_keep_last() {
        assert_eq!(
            segment_signal(25, 10, 10, false),
            vec![(0, 10), (10, 20), (20, 25)]
        );
        // Exact multiple: no empty trailing segment
        assert_eq!(segment_signal(20, 10, 10, false), vec![(0, 10), (10, 20)]);
    }

    #[test]
    fn test_expected_frames() {
        assert_eq!(expected_frames(16_000, 1024, 256), 59);
        assert_eq!(expected_frames(512, 1024, 256), 2);
        assert_eq!(expected_frames(100, 1024, 256), 1);
    }

    #[test]
    fn test_pad_or_trim() {
        let a = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let trimmed = pad_or_trim(a.clone(), 2);
        assert_eq!(trimmed, array![[1.0, 2.0], [3.0, 4.0]]);
        let padded = pad_or_trim(a, 4);
        assert_eq!(padded.row(3).to_vec(), vec![0.0, 0.0]);
        assert_eq!(padded[[2, 1]], 6.0);
    }

    #[test]
    fn test_stats_then_normalize_gives_zero_mean_unit_std() {
        let a = Array2::from_shape_fn((50, 3), |(t, f)| (t as f32 * 0.3 + f as f32).sin() * 4.0 + 2.0);
        let b = Array2::from_shape_fn((30, 3), |(t, f)| (t as f32 * 0.7 - f as f32).cos() + 1.0);
        let stats = compute_feature_stats(&[a.clone(), b.clone()]).unwrap();
        let normalized = normalize_feature_list(&[a, b], &stats).unwrap();
        let refit = compute_feature_stats(&normalized).unwrap();

        for d in 0..3 {
            assert!(refit.mean[d].abs() < 1e-4, "mean {} = {}", d, refit.mean[d]);
            assert!((refit.std[d] - 1.0).abs() < 1e-3, "std {} = {}", d, refit.std[d]);
        }
    }

    #[test]
    fn test_stats_floor_constant_dimension() {
        let a = Array2::from_elem((10, 2), 3.0f32);
        let stats = compute_feature_stats(&[a]).unwrap();
        assert!((stats.mean[0] - 3.0).abs() < 1e-6);
        assert!(stats.std[0] > 0.0, "std must be floored above zero");
    }

    #[test]
    fn test_stats_shape_errors() {
        assert!(matches!(
            compute_feature_stats(&[]),
            Err(DatasetError::ShapeMismatch { .. })
        ));
        let a = Array2::<f32>::zeros((4, 3));
        let b = Array2::<f32>::zeros((4, 2));
        assert!(matches!(
            compute_feature_stats(&[a, b]),
            Err(DatasetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_find_audio_files_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.WAV"), b"x").unwrap();
        fs::write(dir.path().join("sub/a.flac"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let files = find_audio_files(dir.path(), DEFAULT_EXTENSIONS).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0] < files[1], "files must be sorted");
    }

    #[test]
    fn test_find_audio_files_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_audio_files(dir.path(), DEFAULT_EXTENSIONS),
            Err(DatasetError::NoAudioFound { .. })
        ));
        assert!(matches!(
            find_audio_files(dir.path().join("missing"), DEFAULT_EXTENSIONS),
            Err(DatasetError::NoAudioFound { .. })
        ));
    }
}
