// Sample rate conversion with rubato's synchronous FFT resampler

use crate::error::AudioError;
use rubato::{FftFixedInOut, Resampler};

/// Frames per processing block
const CHUNK_SIZE: usize = 1024;

/// Resample a mono signal from `from` Hz to `to` Hz
///
/// The output has exactly `round(len * to / from)` samples: the resampler's
/// group delay is trimmed from the head and the flushed tail is cut (or
/// zero-extended) to that length.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from == 0 || to == 0 {
        return Err(AudioError::ResampleFailed {
            from,
            to,
            reason: "sample rates must be > 0".to_string(),
        });
    }

    let fail = |err: &dyn std::fmt::Display| AudioError::ResampleFailed {
        from,
        to,
        reason: err.to_string(),
    };

    let mut resampler = FftFixedInOut::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 1)
        .map_err(|err| fail(&err))?;

    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= samples.len() {
        let take = resampler.input_frames_next();
        let block = [&samples[pos..pos + take]];
        let out = resampler
            .process(&block[..], None)
            .map_err(|err| fail(&err))?;
        output.extend_from_slice(&out[0]);
        pos += take;
    }

    if pos < samples.len() {
        let tail = [&samples[pos..]];
        let out = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|err| fail(&err))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the delay line
    let mut guard = 0;
    while output.len() < expected + delay && guard < 8 {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|err| fail(&err))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
        guard += 1;
    }

    let start = delay.min(output.len());
    let mut trimmed: Vec<f32> = output.split_off(start);
    trimmed.resize(expected, 0.0);
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_identity_rate_is_passthrough() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn test_output_length_matches_ratio() {
        let input: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * PI * 300.0 * i as f32 / 48_000.0).sin())
            .collect();
        let out = resample(&input, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 16_000);

        let short: Vec<f32> = vec![0.0; 333];
        let out = resample(&short, 22_050, 16_000).unwrap();
        assert_eq!(out.len(), (333.0f64 * 16_000.0 / 22_050.0).round() as usize);
    }

    #[test]
    fn test_tone_energy_is_preserved() {
        let input: Vec<f32> = (0..44_100)
            .map(|i| 0.5 * (2.0 * PI * 200.0 * i as f32 / 44_100.0).sin())
            .collect();
        let out = resample(&input, 44_100, 16_000).unwrap();
        // Skip edges; RMS of a 0.5 amplitude sine is ~0.354
        let mid = &out[2000..14_000];
        let rms = (mid.iter().map(|x| x * x).sum::<f32>() / mid.len() as f32).sqrt();
        assert!((rms - 0.354).abs() < 0.03, "RMS {} drifted after resampling", rms);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        assert!(resample(&[0.0; 10], 0, 16_000).is_err());
    }
}
