// Label vocabulary and side-table parsing
//
// The vocabulary is closed: "lie" and "truth", matched after trimming and
// lowercasing. Anything else is a hard error; labels are never coerced.

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Binary verdict label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Lie,
    Truth,
}

impl Label {
    /// Canonical lowercase name as stored in tensor stores
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Lie => "lie",
            Label::Truth => "truth",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Lie => write!(f, "Lie"),
            Label::Truth => write!(f, "Truth"),
        }
    }
}

/// Immutable mapping between labels and class indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelVocabulary {
    entries: [(Label, u32); 2],
}

/// Canonical mapping used by training, evaluation and inference
pub const LABEL_VOCABULARY: LabelVocabulary = LabelVocabulary {
    entries: [(Label::Lie, 0), (Label::Truth, 1)],
};

impl LabelVocabulary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Class index of a label
    pub fn index_of(&self, label: Label) -> u32 {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, i)| *i)
            .unwrap_or(0)
    }

    /// Label of a class index
    pub fn label_at(&self, index: u32) -> Option<Label> {
        self.entries
            .iter()
            .find(|(_, i)| *i == index)
            .map(|(l, _)| *l)
    }

    /// Parse a raw label string (trimmed, case-insensitive)
    pub fn parse(&self, raw: &str) -> Option<Label> {
        let norm = raw.trim().to_lowercase();
        self.entries
            .iter()
            .map(|(l, _)| *l)
            .find(|l| l.as_str() == norm)
    }
}

/// Encode one raw label to its class index
pub fn encode_label(raw: &str, vocabulary: &LabelVocabulary) -> Result<u32, DatasetError> {
    vocabulary
        .parse(raw)
        .map(|label| vocabulary.index_of(label))
        .ok_or_else(|| DatasetError::UnknownLabel {
            label: raw.to_string(),
            index: None,
        })
}

/// Encode a label column; the first unknown entry aborts with its position
pub fn encode_labels<S: AsRef<str>>(
    raw: &[S],
    vocabulary: &LabelVocabulary,
) -> Result<Vec<u32>, DatasetError> {
    raw.iter()
        .enumerate()
        .map(|(i, label)| {
            encode_label(label.as_ref(), vocabulary).map_err(|_| DatasetError::UnknownLabel {
                label: label.as_ref().to_string(),
                index: Some(i),
            })
        })
        .collect()
}

/// Read a `filepath,label` side-table into a basename -> label map
///
/// Labels are stored as written; validation happens at encoding time.
pub fn read_label_table<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>, DatasetError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| DatasetError::LabelTable {
                reason: format!(
                    "{} must contain columns: filepath,label",
                    path.as_ref().display()
                ),
            })
    };
    let path_col = column("filepath")?;
    let label_col = column("label")?;

    let mut labels = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let file = record.get(path_col).unwrap_or_default().trim();
        let label = record.get(label_col).unwrap_or_default();
        let basename = Path::new(file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        labels.insert(basename, label.trim().to_string());
    }
    Ok(labels)
}
