//! Synthetic corpus helpers shared by the integration tests

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

pub const SAMPLE_RATE: u32 = 16_000;

/// Write a mono 16-bit WAV: a gliding tone plus a little seeded noise
pub fn write_voice_like_wav(path: &Path, base_hz: f32, seconds: f32, seed: u64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let total = (seconds * SAMPLE_RATE as f32) as usize;
    let mut phase = 0.0f32;
    for i in 0..total {
        let t = i as f32 / SAMPLE_RATE as f32;
        let freq = base_hz * (1.0 + 0.05 * (2.0 * PI * 3.0 * t).sin());
        phase += 2.0 * PI * freq / SAMPLE_RATE as f32;
        let envelope = 0.5 + 0.5 * (2.0 * PI * 2.0 * t).sin().abs();
        let s = 0.4 * envelope * phase.sin() + 0.02 * rng.gen_range(-1.0f32..1.0);
        writer
            .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Corpus layout produced by [`write_corpus`]
pub struct Corpus {
    pub raw_dir: PathBuf,
    pub labels_csv: PathBuf,
    pub files: Vec<PathBuf>,
}

/// 10 recordings of 2 s each (5 lie, 5 truth) plus a label side-table
pub fn write_corpus(root: &Path) -> Corpus {
    let raw_dir = root.join("raw");
    fs::create_dir_all(&raw_dir).expect("create raw dir");
    let mut csv = String::from("filepath,label\n");
    let mut files = Vec::new();
    for i in 0..10 {
        let (label, base_hz) = if i % 2 == 0 {
            ("lie", 140.0 + i as f32 * 4.0)
        } else {
            ("truth", 230.0 + i as f32 * 4.0)
        };
        let name = format!("clip_{:02}_{}.wav", i, label);
        let path = raw_dir.join(&name);
        write_voice_like_wav(&path, base_hz, 2.0, i as u64);
        csv.push_str(&format!("raw/{},{}\n", name, label));
        files.push(path);
    }
    let labels_csv = root.join("labels.csv");
    fs::write(&labels_csv, csv).expect("write labels");
    Corpus {
        raw_dir,
        labels_csv,
        files,
    }
}
