// Framing and windowing
//
// Splits a signal into overlapping fixed-length frames. The tail is
// zero-padded so that the last frame is complete, and a window whose length
// equals the frame length can be applied to every row.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Analysis window shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hann,
    Hamming,
}

impl WindowKind {
    /// Periodic (DFT-even) window of `length` samples
    pub fn coefficients(self, length: usize) -> Vec<f32> {
        if length == 0 {
            return Vec::new();
        }
        let (a0, a1) = match self {
            WindowKind::Hann => (0.5, 0.5),
            WindowKind::Hamming => (0.54, 0.46),
        };
        (0..length)
            .map(|i| a0 - a1 * (2.0 * PI * i as f32 / length as f32).cos())
            .collect()
    }
}

/// Frames of equal length, one per row
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBatch {
    frames: Array2<f32>,
}

impl FrameBatch {
    /// A batch with no rows but a defined frame length
    pub fn empty(frame_length: usize) -> Self {
        Self {
            frames: Array2::zeros((0, frame_length)),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.nrows()
    }

    pub fn frame_length(&self) -> usize {
        self.frames.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.nrows() == 0
    }

    pub fn frame(&self, index: usize) -> ArrayView1<'_, f32> {
        self.frames.row(index)
    }

    pub fn rows(&self) -> ndarray::iter::Lanes<'_, f32, ndarray::Ix1> {
        self.frames.rows()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.frames
    }

    /// Multiply every frame by a window of exactly the frame length
    pub fn apply_window(mut self, kind: WindowKind) -> Self {
        let window = Array1::from(kind.coefficients(self.frame_length()));
        for mut row in self.frames.rows_mut() {
            row *= &window;
        }
        self
    }
}

/// Slice `signal` into frames of `frame_length` taken every `hop_length`
///
/// Returns an empty batch when the signal is shorter than one frame.
/// Otherwise the tail is padded with `hop - ((len - frame) % hop)` zeros
/// whenever that remainder is non-zero, so no samples are lost.
pub fn segment_frames(signal: &[f32], frame_length: usize, hop_length: usize) -> FrameBatch {
    let hop = hop_length.max(1);
    if frame_length == 0 || signal.len() < frame_length {
        return FrameBatch::empty(frame_length);
    }

    let remainder = (signal.len() - frame_length) % hop;
    let pad = if remainder != 0 { hop - remainder } else { 0 };
    let padded_len = signal.len() + pad;
    let num_frames = 1 + (padded_len - frame_length) / hop;

    let mut frames = Array2::<f32>::zeros((num_frames, frame_length));
    for (i, mut row) in frames.rows_mut().into_iter().enumerate() {
        let start = i * hop;
        let end = (start + frame_length).min(signal.len());
        if start < end {
            for (dst, &src) in row.iter_mut().zip(&signal[start..end]) {
                *dst = src;
            }
        }
    }

    FrameBatch { frames }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_signal_gives_zero_rows() {
        let batch = segment_frames(&[0.1; 399], 400, 160);
        assert_eq!(batch.num_frames(), 0);
        assert_eq!(batch.frame_length(), 400);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_exact_frame_gives_one_row() {
        let batch = segment_frames(&[0.1; 400], 400, 160);
        assert_eq!(batch.num_frames(), 1);
    }

    #[test]
    fn test_tail_is_zero_padded() {
        let signal: Vec<f32> = (0..10).map(|i| i as f32 + 1.0).collect();
        // (10 - 4) % 4 = 2 -> pad 2 -> frames at 0, 4, 8
        let batch = segment_frames(&signal, 4, 4);
        assert_eq!(batch.num_frames(), 3);
        let last = batch.frame(2);
        assert_eq!(last.to_vec(), vec![9.0, 10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_overlapping_frames() {
        let signal: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let batch = segment_frames(&signal, 4, 2);
        assert_eq!(batch.num_frames(), 3);
        assert_eq!(batch.frame(1).to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_window_length_matches_frame() {
        let batch = segment_frames(&[1.0; 400], 400, 160).apply_window(WindowKind::Hann);
        let row = batch.frame(0);
        assert_eq!(row.len(), 400);
        assert!(row[0].abs() < 1e-6, "periodic Hann starts at zero");
        assert!((row[200] - 1.0).abs() < 1e-6, "periodic Hann peaks at N/2");
    }

    #[test]
    fn test_hamming_floor() {
        let w = WindowKind::Hamming.coefficients(8);
        assert!((w[0] - 0.08).abs() < 1e-6);
    }
}
