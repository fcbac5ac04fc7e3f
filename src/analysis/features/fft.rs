// FFT module - short-time Fourier transform
//
// Computes power spectra of windowed frames. The STFT is centered: the
// signal is zero-padded by n_fft/2 on both sides so that frame t is centred
// on sample t * hop.

use crate::analysis::frames::WindowKind;
use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT processor producing power spectra (|X|^2) for fixed-size frames
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Periodic analysis window (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - Frame and transform length in samples
    /// * `window` - Window applied before the transform
    pub fn new(fft_size: usize, window: WindowKind) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_size),
            fft_size,
            window: window.coefficients(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of non-negative frequency bins
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Power spectrum of one frame
    ///
    /// Frames shorter than `fft_size` are zero-padded; longer ones are cut.
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = (0..self.fft_size)
            .map(|i| {
                let sample = frame.get(i).copied().unwrap_or(0.0);
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.num_bins()]
            .iter()
            .map(|c| c.norm_sqr())
            .collect()
    }

    /// Centered power spectrogram, shape (num_bins, num_frames)
    ///
    /// num_frames = 1 + len / hop (integer division), matching a centered
    /// STFT with constant zero padding.
    pub fn power_spectrogram(&self, signal: &[f32], hop: usize) -> Array2<f32> {
        let hop = hop.max(1);
        let half = self.fft_size / 2;
        let mut padded = vec![0.0f32; signal.len() + 2 * half];
        padded[half..half + signal.len()].copy_from_slice(signal);

        let num_frames = 1 + (padded.len() - self.fft_size) / hop;
        let mut spec = Array2::<f32>::zeros((self.num_bins(), num_frames));
        for t in 0..num_frames {
            let start = t * hop;
            let power = self.power_spectrum(&padded[start..start + self.fft_size]);
            for (k, p) in power.into_iter().enumerate() {
                spec[[k, t]] = p;
            }
        }
        spec
    }
}
