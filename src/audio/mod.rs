// Signal loading and normalization
//
// Every recording entering the pipeline passes through this module: it is
// decoded (WAV via hound, compressed containers via symphonia), mixed to mono
// by channel averaging, and resampled to the pipeline rate with rubato.
//
// Module organization:
// - decoder: container decoding to interleaved f32 + channel mixing
// - resample: FFT-based sample rate conversion
// - mod.rs: Signal type, load_audio entry point, media classification

mod decoder;
mod resample;

pub use decoder::{decode_audio_bytes, decode_file, DecodedAudio};
pub use resample::resample;

use crate::error::AudioError;
use std::path::Path;

/// Extensions recognized as audio containers
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg"];

/// Extensions recognized as video containers (rejected; demuxing is external)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm"];

/// Mono signal at a fixed sample rate
///
/// Immutable once constructed; consumers borrow the samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Signal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Coarse classification of a path by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Unknown,
}

/// Classify a file name by its extension (case-insensitive)
pub fn classify_media<P: AsRef<Path>>(path: P) -> MediaKind {
    let ext = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_ascii_lowercase(),
        None => return MediaKind::Unknown,
    };
    if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Audio
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Load an audio file as a mono signal at `target_rate`
///
/// # Errors
/// * `UnsupportedFormat` - video container, unknown extension, no codec
/// * `DecodeFailed` - recognized container with corrupt content
/// * `EmptySignal` - zero decoded samples
/// * `ResampleFailed` - rate conversion failure
/// * `Io` - file could not be opened
pub fn load_audio<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Signal, AudioError> {
    let path = path.as_ref();
    let display = path.display().to_string();

    match classify_media(path) {
        MediaKind::Audio => {}
        MediaKind::Video => {
            return Err(AudioError::UnsupportedFormat {
                path: display,
                reason: "video containers must be converted to audio first".to_string(),
            })
        }
        MediaKind::Unknown => {
            return Err(AudioError::UnsupportedFormat {
                path: display,
                reason: "unrecognized file extension".to_string(),
            })
        }
    }

    let decoded = decode_file(path)?;
    into_signal(decoded, target_rate, &display)
}

/// Normalize decoded audio (already mono) to the target rate
pub(crate) fn into_signal(
    decoded: DecodedAudio,
    target_rate: u32,
    origin: &str,
) -> Result<Signal, AudioError> {
    if decoded.samples.is_empty() {
        return Err(AudioError::EmptySignal {
            path: origin.to_string(),
        });
    }

    let samples = if decoded.sample_rate != target_rate {
        log::debug!(
            "[SignalLoader] Resampling {} from {} Hz to {} Hz",
            origin,
            decoded.sample_rate,
            target_rate
        );
        resample(&decoded.samples, decoded.sample_rate, target_rate)?
    } else {
        decoded.samples
    };

    if samples.is_empty() {
        return Err(AudioError::EmptySignal {
            path: origin.to_string(),
        });
    }

    Ok(Signal::new(samples, target_rate))
}
