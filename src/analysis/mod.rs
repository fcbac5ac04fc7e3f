// Analysis module - DSP front end shared by training, advice and inference
//
// Architecture:
// - frames: overlapping framing and analysis windows
// - features: MFCC(+deltas) for the classifier, pitch/stress for the advisor
// - prosody: corpus-level prosody table (one row per recording)

pub mod features;
pub mod frames;
pub mod prosody;

pub use frames::{segment_frames, FrameBatch, WindowKind};
pub use prosody::{label_from_filename, run_prosody_extraction, ProsodyRecord};
