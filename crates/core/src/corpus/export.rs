//! Evaluation CSV export and row subsampling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::corpus::index::{CorpusIndex, check_data_dir, utt_id_of};
use crate::corpus::ledger::read_utt2dur;
use crate::error::PipelineError;

/// Name of the exported evaluation CSV.
pub const EVAL_CSV: &str = "ultrafake.csv";

#[derive(Serialize)]
struct EvalRow<'a> {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Label")]
    label: &'static str,
    #[serde(rename = "Duration")]
    duration: f64,
    #[serde(rename = "SampleRate")]
    sample_rate: u32,
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Attack")]
    attack: &'a str,
    #[serde(rename = "Speaker")]
    speaker: &'a str,
    #[serde(rename = "Proportion")]
    proportion: &'a str,
    #[serde(rename = "AudioChannel")]
    audio_channel: u32,
    #[serde(rename = "AudioEncoding")]
    audio_encoding: &'static str,
    #[serde(rename = "AudioBitSample")]
    audio_bit_sample: u32,
    #[serde(rename = "Language")]
    language: &'static str,
}

/// Map raw index labels onto the two-class evaluation vocabulary.
fn normalize_label(raw: &str) -> Option<&'static str> {
    match raw {
        "bonafide" | "real" => Some("real"),
        "spoof" | "fake" => Some("fake"),
        _ => None,
    }
}

/// Partition tag derived from the data directory name.
fn partition_of(dir: &Path) -> &'static str {
    if dir.display().to_string().contains("train") {
        "train"
    } else {
        "eval"
    }
}

/// Export the evaluation CSV for a finished data directory.
///
/// Requires `data.csv` and `utt2dur` to be present. Rows whose duration was
/// never probed are skipped with a warning; an unrecognized label aborts the
/// export.
pub fn write_eval_csv(in_dir: &Path, sample_rate: u32) -> Result<PathBuf> {
    check_data_dir(in_dir, &["data.csv", "utt2dur"])?;
    let index = CorpusIndex::load(&in_dir.join("data.csv"))?;
    let durations = read_utt2dur(&in_dir.join("utt2dur"))?;
    let proportion = partition_of(in_dir);

    let out_path = in_dir.join(EVAL_CSV);
    let mut writer = csv::Writer::from_path(&out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;

    let mut written = 0usize;
    for (i, row) in index.rows.iter().enumerate() {
        let utt = utt_id_of(&row.file);
        let label = normalize_label(&row.label).ok_or_else(|| PipelineError::MalformedLabel {
            file: row.file.clone(),
            label: row.label.clone(),
        })?;
        let Some(&duration) = durations.get(&utt) else {
            log::warn!("No duration for {}, skipping", utt);
            continue;
        };
        let wav_path = std::path::absolute(in_dir.join(&row.file))
            .with_context(|| format!("Failed to resolve path for {}", row.file))?;
        writer.serialize(EvalRow {
            id: format!("Syn-{}-{}", i, utt),
            label,
            duration,
            sample_rate,
            path: wav_path.display().to_string(),
            attack: &row.attack,
            speaker: &row.speaker,
            proportion,
            audio_channel: 1,
            audio_encoding: "PCM_S",
            audio_bit_sample: 16,
            language: "EN",
        })?;
        written += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", out_path.display()))?;
    log::info!("Wrote {} rows to {}", written, out_path.display());
    Ok(out_path)
}

/// Draw a uniform random subsample of the evaluation CSV.
///
/// Produces `ultrafake_sample{n}.csv` next to the source CSV, preserving the
/// header. The draw is seeded so repeated runs pick the same rows.
pub fn sample_rows(in_dir: &Path, num_subsamples: usize, seed: u64) -> Result<PathBuf> {
    check_data_dir(in_dir, &[EVAL_CSV, "wavs"])?;
    let src = in_dir.join(EVAL_CSV);
    let mut reader = csv::Reader::from_path(&src)
        .with_context(|| format!("Failed to open {}", src.display()))?;
    let headers = reader.headers()?.clone();
    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .with_context(|| format!("Malformed row in {}", src.display()))?;

    let n = if num_subsamples > records.len() {
        log::warn!(
            "Requested {} rows but only {} available, taking all",
            num_subsamples,
            records.len()
        );
        records.len()
    } else {
        num_subsamples
    };

    let mut rng = StdRng::seed_from_u64(seed);
    let picks = rand::seq::index::sample(&mut rng, records.len(), n);

    let out_path = in_dir.join(format!("ultrafake_sample{}.csv", num_subsamples));
    let mut writer = csv::Writer::from_path(&out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    writer.write_record(&headers)?;
    for idx in picks.iter() {
        writer.write_record(&records[idx])?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", out_path.display()))?;
    log::info!("Sampled {} rows into {}", n, out_path.display());
    Ok(out_path)
}
