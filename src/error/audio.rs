// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 1001-1005
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// File extension or codec cannot be decoded
    pub const UNSUPPORTED_FORMAT: i32 = 1001;

    /// Decoded signal has zero samples
    pub const EMPTY_SIGNAL: i32 = 1002;

    /// Container was recognized but decoding failed
    pub const DECODE_FAILED: i32 = 1003;

    /// Sample rate conversion failed
    pub const RESAMPLE_FAILED: i32 = 1004;

    /// Underlying I/O failure
    pub const IO: i32 = 1005;
}

/// Log an audio error with structured context
///
/// Emits error_code, component and message fields so that failures
/// during corpus runs can be grepped out of long logs.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=SignalLoader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio loading errors
///
/// These errors cover decoding, channel mixing and resampling of a single
/// file. They are fatal to that file; corpus-level callers abort the run.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Unrecognized extension, video container, or missing codec
    UnsupportedFormat { path: String, reason: String },

    /// The decoded stream contained no samples
    EmptySignal { path: String },

    /// Decoder reported a failure on a supported container
    DecodeFailed { path: String, reason: String },

    /// Resampler construction or processing failed
    ResampleFailed { from: u32, to: u32, reason: String },

    /// File could not be opened or read
    Io { details: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::EmptySignal { .. } => AudioErrorCodes::EMPTY_SIGNAL,
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::ResampleFailed { .. } => AudioErrorCodes::RESAMPLE_FAILED,
            AudioError::Io { .. } => AudioErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::UnsupportedFormat { path, reason } => {
                format!("Unsupported audio format for {}: {}", path, reason)
            }
            AudioError::EmptySignal { path } => {
                format!("Decoded signal is empty: {}", path)
            }
            AudioError::DecodeFailed { path, reason } => {
                format!("Failed to decode {}: {}", path, reason)
            }
            AudioError::ResampleFailed { from, to, reason } => {
                format!("Failed to resample {} Hz -> {} Hz: {}", from, to, reason)
            }
            AudioError::Io { details } => format!("I/O error: {}", details),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::Io {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::UnsupportedFormat {
                path: "a.mp4".to_string(),
                reason: "video".to_string()
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_FORMAT
        );
        assert_eq!(
            AudioError::EmptySignal {
                path: "a.wav".to_string()
            }
            .code(),
            AudioErrorCodes::EMPTY_SIGNAL
        );
        assert_eq!(
            AudioError::DecodeFailed {
                path: "a.flac".to_string(),
                reason: "corrupt".to_string()
            }
            .code(),
            AudioErrorCodes::DECODE_FAILED
        );
        assert_eq!(
            AudioError::ResampleFailed {
                from: 44100,
                to: 16000,
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::RESAMPLE_FAILED
        );
        assert_eq!(
            AudioError::Io {
                details: "test".to_string()
            }
            .code(),
            AudioErrorCodes::IO
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::EmptySignal {
            path: "silence.wav".to_string(),
        };
        assert_eq!(err.message(), "Decoded signal is empty: silence.wav");

        let err = AudioError::ResampleFailed {
            from: 48000,
            to: 16000,
            reason: "bad ratio".to_string(),
        };
        assert!(err.message().contains("48000 Hz -> 16000 Hz"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::EmptySignal {
            path: "x.wav".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::Io { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected Io"),
        }
    }
}
