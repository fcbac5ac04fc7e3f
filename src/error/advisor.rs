// Hyperparameter advisor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Advisor error code constants
///
/// Error code range: 3001-3003
pub struct AdvisorErrorCodes {}

impl AdvisorErrorCodes {
    /// Designated input column is absent from the features table
    pub const MISSING_COLUMN: i32 = 3001;

    /// Features table is empty or unreadable
    pub const EMPTY_TABLE: i32 = 3002;

    /// Underlying I/O failure
    pub const IO: i32 = 3003;
}

/// Log an advisor error with structured context
pub fn log_advisor_error(err: &AdvisorError, context: &str) {
    error!(
        "Advisor error in {}: code={}, component=FuzzyAdvisor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Fuzzy hyperparameter advisor errors
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorError {
    /// Column named in the fuzzy config is missing
    MissingColumn { column: String },

    /// Table had no rows or could not be parsed
    EmptyTable { reason: String },

    /// File system failure
    Io { details: String },
}

impl ErrorCode for AdvisorError {
    fn code(&self) -> i32 {
        match self {
            AdvisorError::MissingColumn { .. } => AdvisorErrorCodes::MISSING_COLUMN,
            AdvisorError::EmptyTable { .. } => AdvisorErrorCodes::EMPTY_TABLE,
            AdvisorError::Io { .. } => AdvisorErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            AdvisorError::MissingColumn { column } => {
                format!("Features table has no column '{}'", column)
            }
            AdvisorError::EmptyTable { reason } => format!("Features table unusable: {}", reason),
            AdvisorError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for AdvisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AdvisorError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AdvisorError {}

impl From<std::io::Error> for AdvisorError {
    fn from(err: std::io::Error) -> Self {
        AdvisorError::Io {
            details: err.to_string(),
        }
    }
}

impl From<csv::Error> for AdvisorError {
    fn from(err: csv::Error) -> Self {
        AdvisorError::EmptyTable {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        AdvisorError::EmptyTable {
            reason: err.to_string(),
        }
    }
}
