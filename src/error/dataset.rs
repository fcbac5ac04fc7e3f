// Dataset error types and constants

use crate::error::{AudioError, ErrorCode};
use log::error;
use std::fmt;

/// Dataset error code constants
///
/// Error code range: 2001-2009
pub struct DatasetErrorCodes {}

impl DatasetErrorCodes {
    /// Input folder yielded no files with an allowed extension
    pub const NO_AUDIO_FOUND: i32 = 2001;

    /// Segment tensors disagree on feature dimensionality
    pub const INCONSISTENT_FEATURE_DIM: i32 = 2002;

    /// Feature array rank or column count is wrong
    pub const SHAPE_MISMATCH: i32 = 2003;

    /// Label string outside the fixed vocabulary
    pub const UNKNOWN_LABEL: i32 = 2004;

    /// Label side-table is missing or malformed
    pub const LABEL_TABLE: i32 = 2005;

    /// A corpus file failed to load
    pub const AUDIO: i32 = 2006;

    /// Tensor store could not be written or parsed
    pub const STORE: i32 = 2007;

    /// Build configuration is invalid
    pub const INVALID_CONFIG: i32 = 2008;

    /// Underlying I/O failure
    pub const IO: i32 = 2009;
}

/// Log a dataset error with structured context
pub fn log_dataset_error(err: &DatasetError, context: &str) {
    error!(
        "Dataset error in {}: code={}, component=DatasetBuilder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Dataset building and loading errors
///
/// Every variant aborts the current top-level operation; a partially built
/// store is never written.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// No matching audio files under the input folder
    NoAudioFound { folder: String },

    /// A segment's feature width differs from the first segment's
    InconsistentFeatureDim {
        segment: usize,
        expected: usize,
        found: usize,
    },

    /// Feature statistics received malformed arrays
    ShapeMismatch { reason: String },

    /// Label outside {"lie", "truth"}
    UnknownLabel { label: String, index: Option<usize> },

    /// Label side-table problem (missing columns, parse failure)
    LabelTable { reason: String },

    /// A corpus file failed to load
    Audio(AudioError),

    /// Tensor store serialization/deserialization failure
    Store { reason: String },

    /// Configuration value out of range
    InvalidConfig { reason: String },

    /// File system failure
    Io { details: String },
}

impl ErrorCode for DatasetError {
    fn code(&self) -> i32 {
        match self {
            DatasetError::NoAudioFound { .. } => DatasetErrorCodes::NO_AUDIO_FOUND,
            DatasetError::InconsistentFeatureDim { .. } => {
                DatasetErrorCodes::INCONSISTENT_FEATURE_DIM
            }
            DatasetError::ShapeMismatch { .. } => DatasetErrorCodes::SHAPE_MISMATCH,
            DatasetError::UnknownLabel { .. } => DatasetErrorCodes::UNKNOWN_LABEL,
            DatasetError::LabelTable { .. } => DatasetErrorCodes::LABEL_TABLE,
            DatasetError::Audio(_) => DatasetErrorCodes::AUDIO,
            DatasetError::Store { .. } => DatasetErrorCodes::STORE,
            DatasetError::InvalidConfig { .. } => DatasetErrorCodes::INVALID_CONFIG,
            DatasetError::Io { .. } => DatasetErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            DatasetError::NoAudioFound { folder } => {
                format!("No audio files found in: {}", folder)
            }
            DatasetError::InconsistentFeatureDim {
                segment,
                expected,
                found,
            } => format!(
                "Segment {} has feature dim {} (expected {})",
                segment, found, expected
            ),
            DatasetError::ShapeMismatch { reason } => format!("Shape mismatch: {}", reason),
            DatasetError::UnknownLabel { label, index } => match index {
                Some(i) => format!(
                    "Unknown label '{}' at index {}. Expected one of [lie, truth]",
                    label, i
                ),
                None => format!("Unknown label '{}'. Expected one of [lie, truth]", label),
            },
            DatasetError::LabelTable { reason } => format!("Label table error: {}", reason),
            DatasetError::Audio(err) => err.message(),
            DatasetError::Store { reason } => format!("Tensor store error: {}", reason),
            DatasetError::InvalidConfig { reason } => {
                format!("Invalid preprocessing config: {}", reason)
            }
            DatasetError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DatasetError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DatasetError {}

impl From<AudioError> for DatasetError {
    fn from(err: AudioError) -> Self {
        DatasetError::Audio(err)
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        DatasetError::Io {
            details: err.to_string(),
        }
    }
}

impl From<safetensors::SafeTensorError> for DatasetError {
    fn from(err: safetensors::SafeTensorError) -> Self {
        DatasetError::Store {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        DatasetError::Store {
            reason: err.to_string(),
        }
    }
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::LabelTable {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_error_codes() {
        assert_eq!(
            DatasetError::NoAudioFound {
                folder: "x".to_string()
            }
            .code(),
            DatasetErrorCodes::NO_AUDIO_FOUND
        );
        assert_eq!(
            DatasetError::InconsistentFeatureDim {
                segment: 3,
                expected: 39,
                found: 13
            }
            .code(),
            DatasetErrorCodes::INCONSISTENT_FEATURE_DIM
        );
        assert_eq!(
            DatasetError::UnknownLabel {
                label: "maybe".to_string(),
                index: None
            }
            .code(),
            DatasetErrorCodes::UNKNOWN_LABEL
        );
    }

    #[test]
    fn test_unknown_label_message_mentions_vocabulary() {
        let err = DatasetError::UnknownLabel {
            label: "maybe".to_string(),
            index: Some(4),
        };
        let msg = err.message();
        assert!(msg.contains("'maybe'"));
        assert!(msg.contains("index 4"));
        assert!(msg.contains("lie, truth"));
    }

    #[test]
    fn test_audio_error_is_wrapped() {
        let audio = AudioError::EmptySignal {
            path: "a.wav".to_string(),
        };
        let err: DatasetError = audio.clone().into();
        assert_eq!(err, DatasetError::Audio(audio));
        assert_eq!(err.code(), DatasetErrorCodes::AUDIO);
    }
}
