// Container decoding
//
// WAV goes through hound (the fast, exact path for the common case).
// Everything else is probed by symphonia. Both paths mix to mono by
// averaging channels.

use crate::error::AudioError;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono samples at the container's native rate
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a file on disk, choosing the decoder by extension
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let display = path.display().to_string();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if ext.as_deref() == Some("wav") {
        let reader = hound::WavReader::open(path).map_err(|err| hound_error(&display, err))?;
        return read_wav(reader, &display);
    }

    let file = File::open(path)?;
    decode_with_symphonia(Box::new(file), ext.as_deref(), &display)
}

/// Decode an in-memory buffer
///
/// RIFF/WAVE payloads are read with hound; anything else is handed to the
/// symphonia probe with `hint` (an extension such as "mp3") if known.
pub fn decode_audio_bytes(bytes: &[u8], hint: Option<&str>) -> Result<DecodedAudio, AudioError> {
    let origin = "<bytes>";
    if bytes.is_empty() {
        return Err(AudioError::EmptySignal {
            path: origin.to_string(),
        });
    }

    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        let reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|err| hound_error(origin, err))?;
        return read_wav(reader, origin);
    }

    let owned = Cursor::new(bytes.to_vec());
    decode_with_symphonia(Box::new(owned), hint, origin)
}

fn hound_error(origin: &str, err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(io) => AudioError::Io {
            details: format!("{}: {}", origin, io),
        },
        hound::Error::Unsupported | hound::Error::FormatError(_) => AudioError::UnsupportedFormat {
            path: origin.to_string(),
            reason: err.to_string(),
        },
        other => AudioError::DecodeFailed {
            path: origin.to_string(),
            reason: other.to_string(),
        },
    }
}

fn read_wav<R: Read>(
    mut reader: hound::WavReader<R>,
    origin: &str,
) -> Result<DecodedAudio, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::DecodeFailed {
            path: origin.to_string(),
            reason: "zero channels".to_string(),
        });
    }

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| hound_error(origin, err))?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 | 16 | 24 | 32 => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(|err| hound_error(origin, err))?
            }
            bits => {
                return Err(AudioError::UnsupportedFormat {
                    path: origin.to_string(),
                    reason: format!("unsupported bits_per_sample={}", bits),
                })
            }
        },
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, spec.channels as usize),
        sample_rate: spec.sample_rate,
    })
}

fn decode_with_symphonia(
    source: Box<dyn MediaSource>,
    ext_hint: Option<&str>,
    origin: &str,
) -> Result<DecodedAudio, AudioError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|err| AudioError::UnsupportedFormat {
            path: origin.to_string(),
            reason: err.to_string(),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat {
            path: origin.to_string(),
            reason: "no decodable audio track".to_string(),
        })?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::DecodeFailed {
            path: origin.to_string(),
            reason: "track does not declare a sample rate".to_string(),
        })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| AudioError::UnsupportedFormat {
            path: origin.to_string(),
            reason: err.to_string(),
        })?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(err) => match packet_flow(err, origin) {
                PacketFlow::EndOfStream => break,
                PacketFlow::Reset => {
                    log::warn!(
                        "[SignalLoader] Stream parameters changed in {} after {} samples; resetting decoder",
                        origin,
                        mono.len()
                    );
                    decoder.reset();
                    continue;
                }
                PacketFlow::Fail(err) => return Err(err),
            },
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                if buf.capacity() < decoded.capacity() * channels {
                    *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                }
                buf.copy_interleaved_ref(decoded);
                mono.extend(downmix(buf.samples(), channels));
            }
            // Corrupt packets are skipped; the stream as a whole still decodes.
            Err(SymphoniaError::DecodeError(err)) => {
                log::debug!("[SignalLoader] Skipping bad packet in {}: {}", origin, err);
                continue;
            }
            Err(err) => {
                return Err(AudioError::DecodeFailed {
                    path: origin.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

/// What the packet loop does after `next_packet` fails
#[derive(Debug)]
enum PacketFlow {
    EndOfStream,
    Reset,
    Fail(AudioError),
}

fn packet_flow(err: SymphoniaError, origin: &str) -> PacketFlow {
    match err {
        SymphoniaError::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            PacketFlow::EndOfStream
        }
        SymphoniaError::ResetRequired => PacketFlow::Reset,
        other => PacketFlow::Fail(AudioError::DecodeFailed {
            path: origin.to_string(),
            reason: other.to_string(),
        }),
    }
}

/// Average interleaved frames to mono
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_decode_wav_bytes() {
        let bytes = wav_bytes(&[0.0, 0.25, -0.25, 0.5], 8000);
        let decoded = decode_audio_bytes(&bytes, None).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples, vec![0.0, 0.25, -0.25, 0.5]);
    }

    #[test]
    fn test_decode_garbage_bytes_is_unsupported() {
        let bytes = vec![7u8; 256];
        match decode_audio_bytes(&bytes, Some("mp3")) {
            Err(AudioError::UnsupportedFormat { .. }) | Err(AudioError::DecodeFailed { .. }) => {}
            other => panic!("Expected a decode failure, got {:?}", other),
        }
    }

    #[test]
    fn test_packet_errors_map_to_loop_actions() {
        let eof = SymphoniaError::IoError(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(matches!(packet_flow(eof, "a.ogg"), PacketFlow::EndOfStream));
        assert!(matches!(
            packet_flow(SymphoniaError::ResetRequired, "a.ogg"),
            PacketFlow::Reset
        ));
        let other = SymphoniaError::IoError(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        match packet_flow(other, "a.ogg") {
            PacketFlow::Fail(AudioError::DecodeFailed { path, .. }) => assert_eq!(path, "a.ogg"),
            flow => panic!("Expected DecodeFailed, got {:?}", flow),
        }
    }

    #[test]
    fn test_decode_empty_bytes() {
        assert!(matches!(
            decode_audio_bytes(&[], None),
            Err(AudioError::EmptySignal { .. })
        ));
    }
}
