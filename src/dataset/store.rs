// Tensor store - single-file safetensors container for a processed corpus
//
// Layout:
// - tensors: features (N x T x F, F32), start_sample / end_sample (N, I64),
//   feature_mean / feature_std (F, F32)
// - metadata: labels and file_ids as JSON string arrays, the full build
//   config as JSON, and one `config.<field>` entry per scalar config field
//
// Readers memory-map the file read-only, so any number of them can share it.

use crate::config::{FeatureConfig, PreprocessConfig};
use crate::error::DatasetError;
use memmap2::{Mmap, MmapOptions};
use ndarray::{Array2, Array3};
use safetensors::tensor::{Dtype, View};
use safetensors::SafeTensors;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::path::Path;

const FEATURES: &str = "features";
const START_SAMPLE: &str = "start_sample";
const END_SAMPLE: &str = "end_sample";
const FEATURE_MEAN: &str = "feature_mean";
const FEATURE_STD: &str = "feature_std";
const META_LABELS: &str = "labels";
const META_FILE_IDS: &str = "file_ids";
const META_BUILD_CONFIG: &str = "build_config";
const CONFIG_PREFIX: &str = "config.";

/// Provenance of one stored segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMeta {
    pub file_id: String,
    pub start_sample: i64,
    pub end_sample: i64,
    pub label: Option<String>,
}

/// Everything written to a store in one call
#[derive(Debug, Clone)]
pub struct StoreContents {
    /// Normalized, padded features (N x T x F)
    pub features: Array3<f32>,
    pub segments: Vec<SegmentMeta>,
    pub feature_mean: Vec<f32>,
    pub feature_std: Vec<f32>,
    pub config: PreprocessConfig,
}

/// Raw little-endian tensor handed to the safetensors serializer
struct RawTensor {
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl RawTensor {
    fn f32(shape: Vec<usize>, values: impl IntoIterator<Item = f32>) -> Self {
        let data = values.into_iter().flat_map(f32::to_le_bytes).collect();
        Self {
            dtype: Dtype::F32,
            shape,
            data,
        }
    }

    fn i64(values: &[i64]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self {
            dtype: Dtype::I64,
            shape: vec![values.len()],
            data,
        }
    }
}

impl View for RawTensor {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Flatten the scalar fields of a config into `config.<field>` strings
///
/// Nested sections contribute their leaf names; lists are skipped and a
/// missing optional value is recorded as an empty string.
pub fn flatten_config(config: &PreprocessConfig) -> Result<BTreeMap<String, String>, DatasetError> {
    fn walk(value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
        if let serde_json::Value::Object(map) = value {
            for (key, v) in map {
                match v {
                    serde_json::Value::Object(_) => walk(v, out),
                    serde_json::Value::Array(_) => {}
                    serde_json::Value::Null => {
                        out.insert(format!("{}{}", CONFIG_PREFIX, key), String::new());
                    }
                    serde_json::Value::String(s) => {
                        out.insert(format!("{}{}", CONFIG_PREFIX, key), s.clone());
                    }
                    other => {
                        out.insert(format!("{}{}", CONFIG_PREFIX, key), other.to_string());
                    }
                }
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(&serde_json::to_value(config)?, &mut out);
    Ok(out)
}

/// Tensor section of a store
fn encode_tensors(contents: &StoreContents) -> Vec<(String, RawTensor)> {
    let (n, t, f) = contents.features.dim();
    let starts: Vec<i64> = contents.segments.iter().map(|s| s.start_sample).collect();
    let ends: Vec<i64> = contents.segments.iter().map(|s| s.end_sample).collect();
    vec![
        (
            FEATURES.to_string(),
            RawTensor::f32(vec![n, t, f], contents.features.iter().copied()),
        ),
        (START_SAMPLE.to_string(), RawTensor::i64(&starts)),
        (END_SAMPLE.to_string(), RawTensor::i64(&ends)),
        (
            FEATURE_MEAN.to_string(),
            RawTensor::f32(vec![f], contents.feature_mean.iter().copied()),
        ),
        (
            FEATURE_STD.to_string(),
            RawTensor::f32(vec![f], contents.feature_std.iter().copied()),
        ),
    ]
}

/// String metadata section of a store
fn encode_metadata(contents: &StoreContents) -> Result<HashMap<String, String>, DatasetError> {
    let labels: Vec<&str> = contents
        .segments
        .iter()
        .map(|s| s.label.as_deref().unwrap_or(""))
        .collect();
    let file_ids: Vec<&str> = contents.segments.iter().map(|s| s.file_id.as_str()).collect();

    let mut metadata: HashMap<String, String> =
        flatten_config(&contents.config)?.into_iter().collect();
    metadata.insert(META_LABELS.to_string(), serde_json::to_string(&labels)?);
    metadata.insert(META_FILE_IDS.to_string(), serde_json::to_string(&file_ids)?);
    metadata.insert(
        META_BUILD_CONFIG.to_string(),
        serde_json::to_string(&contents.config)?,
    );
    Ok(metadata)
}

/// Write a store whose header carries no build config, as older or foreign
/// writers produce
#[cfg(test)]
pub(crate) fn write_without_build_config(
    path: &Path,
    contents: &StoreContents,
) -> Result<(), DatasetError> {
    let mut metadata = encode_metadata(contents)?;
    metadata.remove(META_BUILD_CONFIG);
    safetensors::tensor::serialize_to_file(encode_tensors(contents), &Some(metadata), path)?;
    Ok(())
}

fn decode_f32(raw: &[u8]) -> Vec<f32> {
    raw.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn decode_i64(raw: &[u8]) -> Vec<i64> {
    raw.chunks_exact(8)
        .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

fn store_error(reason: impl Into<String>) -> DatasetError {
    DatasetError::Store {
        reason: reason.into(),
    }
}

/// Read-only, memory-mapped view of a tensor store
pub struct TensorStore {
    mmap: Mmap,
    shape: [usize; 3],
    labels: Vec<String>,
    file_ids: Vec<String>,
    start_sample: Vec<i64>,
    end_sample: Vec<i64>,
    feature_mean: Vec<f32>,
    feature_std: Vec<f32>,
    attributes: BTreeMap<String, String>,
    build_config: Option<PreprocessConfig>,
}

impl TensorStore {
    /// Serialize `contents` to `path`, creating parent directories
    pub fn write<P: AsRef<Path>>(path: P, contents: &StoreContents) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let (n, t, f) = contents.features.dim();
        if n != contents.segments.len() {
            return Err(DatasetError::ShapeMismatch {
                reason: format!(
                    "{} feature rows but {} segment records",
                    n,
                    contents.segments.len()
                ),
            });
        }
        if contents.feature_mean.len() != f || contents.feature_std.len() != f {
            return Err(DatasetError::ShapeMismatch {
                reason: format!(
                    "mean/std have {}/{} entries, features have {} columns",
                    contents.feature_mean.len(),
                    contents.feature_std.len(),
                    f
                ),
            });
        }

        let tensors = encode_tensors(contents);
        let metadata = encode_metadata(contents)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        safetensors::tensor::serialize_to_file(tensors, &Some(metadata), path)?;
        log::info!(
            "[TensorStore] Wrote {} segments ({} x {}) to {}",
            n,
            t,
            f,
            path.display()
        );
        Ok(())
    }

    /// Memory-map a store and parse its header, labels and statistics
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and stores are never rewritten in place.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let (_, header) = SafeTensors::read_metadata(&mmap)?;
        let meta = header.metadata().clone().unwrap_or_default();
        let st = SafeTensors::deserialize(&mmap)?;

        let features = st.tensor(FEATURES)?;
        if features.dtype() != Dtype::F32 || features.shape().len() != 3 {
            return Err(store_error(format!(
                "'{}' must be a rank-3 F32 tensor, found {:?} {:?}",
                FEATURES,
                features.dtype(),
                features.shape()
            )));
        }
        let shape = [
            features.shape()[0],
            features.shape()[1],
            features.shape()[2],
        ];

        let read_json_list = |key: &str| -> Result<Vec<String>, DatasetError> {
            let raw = meta
                .get(key)
                .ok_or_else(|| store_error(format!("metadata '{}' missing", key)))?;
            Ok(serde_json::from_str(raw)?)
        };
        let labels = read_json_list(META_LABELS)?;
        let file_ids = read_json_list(META_FILE_IDS)?;

        let start_sample = decode_i64(st.tensor(START_SAMPLE)?.data());
        let end_sample = decode_i64(st.tensor(END_SAMPLE)?.data());
        let feature_mean = decode_f32(st.tensor(FEATURE_MEAN)?.data());
        let feature_std = decode_f32(st.tensor(FEATURE_STD)?.data());

        let n = shape[0];
        if labels.len() != n || file_ids.len() != n || start_sample.len() != n || end_sample.len() != n
        {
            return Err(store_error("per-segment arrays disagree with feature count"));
        }
        if feature_mean.len() != shape[2] || feature_std.len() != shape[2] {
            return Err(store_error("mean/std width disagrees with feature width"));
        }

        let build_config = meta
            .get(META_BUILD_CONFIG)
            .map(|raw| serde_json::from_str::<PreprocessConfig>(raw))
            .transpose()
            .map_err(|err| store_error(format!("unreadable '{}': {}", META_BUILD_CONFIG, err)))?;
        let attributes = meta
            .into_iter()
            .filter(|(k, _)| k.starts_with(CONFIG_PREFIX))
            .collect();

        Ok(Self {
            mmap,
            shape,
            labels,
            file_ids,
            start_sample,
            end_sample,
            feature_mean,
            feature_std,
            attributes,
            build_config,
        })
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    pub fn time_steps(&self) -> usize {
        self.shape[1]
    }

    pub fn feature_dim(&self) -> usize {
        self.shape[2]
    }

    /// Raw label strings ("" where the corpus had no label)
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn feature_mean(&self) -> &[f32] {
        &self.feature_mean
    }

    pub fn feature_std(&self) -> &[f32] {
        &self.feature_std
    }

    /// Flattened `config.<field>` attributes
    pub fn config_attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Full build configuration, when the store recorded one
    pub fn build_config(&self) -> Option<&PreprocessConfig> {
        self.build_config.as_ref()
    }

    /// Feature front end the stored segments were extracted with
    pub fn feature_config(&self) -> Result<&FeatureConfig, DatasetError> {
        self.build_config
            .as_ref()
            .map(|config| &config.features)
            .ok_or_else(|| {
                store_error(format!(
                    "store has no '{}' entry; its feature front end is unknown",
                    META_BUILD_CONFIG
                ))
            })
    }

    pub fn metadata(&self, index: usize) -> Option<SegmentMeta> {
        if index >= self.len() {
            return None;
        }
        let label = &self.labels[index];
        Some(SegmentMeta {
            file_id: self.file_ids[index].clone(),
            start_sample: self.start_sample[index],
            end_sample: self.end_sample[index],
            label: if label.is_empty() {
                None
            } else {
                Some(label.clone())
            },
        })
    }

    /// Random access to one segment's (T x F) features
    pub fn segment(&self, index: usize) -> Result<Array2<f32>, DatasetError> {
        if index >= self.len() {
            return Err(store_error(format!(
                "segment {} out of range ({} segments)",
                index,
                self.len()
            )));
        }
        let st = SafeTensors::deserialize(&self.mmap)?;
        let view = st.tensor(FEATURES)?;
        let row = self.shape[1] * self.shape[2] * 4;
        let bytes = &view.data()[index * row..(index + 1) * row];
        Array2::from_shape_vec((self.shape[1], self.shape[2]), decode_f32(bytes))
            .map_err(|err| store_error(err.to_string()))
    }

    /// All features as one (N x T x F) array
    pub fn features(&self) -> Result<Array3<f32>, DatasetError> {
        let st = SafeTensors::deserialize(&self.mmap)?;
        let view = st.tensor(FEATURES)?;
        Array3::from_shape_vec(
            (self.shape[0], self.shape[1], self.shape[2]),
            decode_f32(view.data()),
        )
        .map_err(|err| store_error(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contents() -> StoreContents {
        let features = Array3::from_shape_fn((3, 4, 2), |(n, t, f)| (n * 100 + t * 10 + f) as f32);
        let segments = (0..3)
            .map(|i| SegmentMeta {
                file_id: format!("clip{}.wav", i / 2),
                start_sample: i as i64 * 16_000,
                end_sample: (i as i64 + 1) * 16_000,
                label: if i == 2 { None } else { Some("lie".to_string()) },
            })
            .collect();
        StoreContents {
            features,
            segments,
            feature_mean: vec![0.5, -0.5],
            feature_std: vec![1.5, 2.0],
            config: PreprocessConfig::default(),
        }
    }

    #[test]
    fn test_write_then_open_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/store.safetensors");
        let contents = sample_contents();
        TensorStore::write(&path, &contents).unwrap();

        let store = TensorStore::open(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.time_steps(), 4);
        assert_eq!(store.feature_dim(), 2);
        assert_eq!(store.features().unwrap(), contents.features);
        assert_eq!(store.feature_mean(), &[0.5, -0.5]);
        assert_eq!(store.feature_std(), &[1.5, 2.0]);
        assert_eq!(store.labels(), &["lie", "lie", ""]);
        assert_eq!(store.metadata(2).unwrap().label, None);
        assert_eq!(store.metadata(1).unwrap().start_sample, 16_000);
        assert_eq!(store.build_config(), Some(&PreprocessConfig::default()));
    }

    #[test]
    fn test_random_access_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.safetensors");
        let contents = sample_contents();
        TensorStore::write(&path, &contents).unwrap();

        let store = TensorStore::open(&path).unwrap();
        let seg = store.segment(1).unwrap();
        assert_eq!(seg[[2, 1]], 121.0);
        assert!(store.segment(3).is_err());
    }

    #[test]
    fn test_config_attributes_are_flattened() {
        let attrs = flatten_config(&PreprocessConfig::default()).unwrap();
        assert_eq!(attrs.get("config.n_mfcc").map(String::as_str), Some("13"));
        assert_eq!(attrs.get("config.hop_length").map(String::as_str), Some(""));
        assert_eq!(attrs.get("config.window").map(String::as_str), Some("hann"));
        assert!(!attrs.contains_key("config.allowed_extensions"));
    }

    #[test]
    fn test_missing_build_config_has_no_front_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.safetensors");
        write_without_build_config(&path, &sample_contents()).unwrap();

        let store = TensorStore::open(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert!(store.build_config().is_none());
        assert!(matches!(
            store.feature_config(),
            Err(DatasetError::Store { .. })
        ));
    }

    #[test]
    fn test_unreadable_build_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.safetensors");
        let contents = sample_contents();
        let mut metadata = encode_metadata(&contents).unwrap();
        metadata.insert(META_BUILD_CONFIG.to_string(), "{not json".to_string());
        safetensors::tensor::serialize_to_file(encode_tensors(&contents), &Some(metadata), &path)
            .unwrap();

        match TensorStore::open(&path) {
            Err(DatasetError::Store { reason }) => assert!(reason.contains("build_config")),
            Err(other) => panic!("Expected Store error, got {:?}", other),
            Ok(_) => panic!("Expected Store error, store opened"),
        }
    }

    #[test]
    fn test_feature_config_comes_from_build_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.safetensors");
        let mut contents = sample_contents();
        contents.config.features.n_mfcc = 20;
        TensorStore::write(&path, &contents).unwrap();

        let store = TensorStore::open(&path).unwrap();
        assert_eq!(store.feature_config().unwrap().n_mfcc, 20);
    }

    #[test]
    fn test_mismatched_rows_are_rejected() {
        let mut contents = sample_contents();
        contents.segments.pop();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        assert!(matches!(
            TensorStore::write(&path, &contents),
            Err(DatasetError::ShapeMismatch { .. })
        ));
        assert!(!path.exists(), "nothing is written on failure");
    }
}
