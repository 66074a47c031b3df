//! Duration and speaker ledgers: `utt2dur` and `spk2utt` sidecar files.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::audio::io::get_wav_duration;
use crate::corpus::index::CorpusIndex;

/// Read `utt2dur`: one `utt_id duration` pair per line, keyed by utterance id.
pub fn read_utt2dur(path: &Path) -> Result<HashMap<String, f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut durations = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (id, dur) = match (fields.next(), fields.next(), fields.next()) {
            (Some(id), Some(dur), None) => (id, dur),
            _ => bail!("Malformed line {} in {}", lineno + 1, path.display()),
        };
        let dur: f64 = dur
            .parse()
            .with_context(|| format!("Bad duration on line {} in {}", lineno + 1, path.display()))?;
        durations.insert(id.to_string(), dur);
    }
    Ok(durations)
}

/// Probe every waveform in the index and write `utt2dur`.
///
/// Files that are missing or unreadable are skipped with a warning so that a
/// partially-populated corpus still yields a usable ledger. Returns the number
/// of entries written.
pub fn write_utt2dur(index: &CorpusIndex, data_dir: &Path, out_path: &Path) -> Result<usize> {
    let mut out = String::new();
    let mut written = 0usize;
    for row in &index.rows {
        let wav_path = data_dir.join(&row.file);
        if !wav_path.exists() {
            log::warn!("{} does not exist, skipping duration probe", wav_path.display());
            continue;
        }
        let duration = match get_wav_duration(&wav_path) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Failed to probe {}: {:#}", wav_path.display(), e);
                continue;
            }
        };
        let _ = writeln!(out, "{} {:.3}", row.utt_id(), duration);
        written += 1;
    }
    std::fs::write(out_path, out)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(written)
}

/// Read `spk2utt`: one `speaker utt1 utt2 ...` line per speaker.
pub fn read_spk2utt(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut speakers = HashMap::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(speaker) = fields.next() else {
            continue;
        };
        let utts: Vec<String> = fields.map(|s| s.to_string()).collect();
        speakers.insert(speaker.to_string(), utts);
    }
    Ok(speakers)
}

/// Group the index by speaker and write `spk2utt`.
///
/// Speakers appear in first-seen index order. Returns the number of speakers
/// written.
pub fn write_spk2utt(index: &CorpusIndex, out_path: &Path) -> Result<usize> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for row in &index.rows {
        let utts = groups.entry(row.speaker.clone()).or_insert_with(|| {
            order.push(row.speaker.clone());
            Vec::new()
        });
        utts.push(row.utt_id());
    }
    let mut out = String::new();
    for speaker in &order {
        let _ = write!(out, "{}", speaker);
        for utt in &groups[speaker] {
            let _ = write!(out, " {}", utt);
        }
        out.push('\n');
    }
    std::fs::write(out_path, out)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(order.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::io::write_wav;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("ultrafake_test_ledger").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_utt2dur_roundtrip() {
        let dir = temp_dir("utt2dur_roundtrip");
        let path = dir.join("utt2dur");
        std::fs::write(&path, "u1 1.500\nu2 0.250\n").unwrap();

        let durations = read_utt2dur(&path).unwrap();
        assert_eq!(durations.len(), 2);
        assert!((durations["u1"] - 1.5).abs() < 1e-9);
        assert!((durations["u2"] - 0.25).abs() < 1e-9);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_utt2dur_rejects_malformed() {
        let dir = temp_dir("utt2dur_malformed");
        let path = dir.join("utt2dur");
        std::fs::write(&path, "u1 1.5 extra\n").unwrap();

        assert!(read_utt2dur(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_utt2dur_probes_wavs() {
        let dir = temp_dir("utt2dur_probe");
        let samples = vec![0.1; 16000];
        write_wav(&dir.join("wavs/u1.wav"), &samples, 16000).unwrap();

        let mut index = CorpusIndex::new();
        index.push("wavs/u1.wav".into(), "bonafide", "spk1", "-");
        index.push("wavs/missing.wav".into(), "spoof", "spk1", "A01");

        let out = dir.join("utt2dur");
        let written = write_utt2dur(&index, &dir, &out).unwrap();
        assert_eq!(written, 1);

        let durations = read_utt2dur(&out).unwrap();
        assert!((durations["u1"] - 1.0).abs() < 1e-3);
        assert!(!durations.contains_key("missing"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_spk2utt_roundtrip_preserves_order() {
        let dir = temp_dir("spk2utt");
        let mut index = CorpusIndex::new();
        index.push("wavs/u1.wav".into(), "bonafide", "spk_b", "-");
        index.push("wavs/u2.wav".into(), "spoof", "spk_a", "A01");
        index.push("wavs/u3.wav".into(), "bonafide", "spk_b", "-");

        let path = dir.join("spk2utt");
        let written = write_spk2utt(&index, &path).unwrap();
        assert_eq!(written, 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "spk_b u1 u3");
        assert_eq!(lines[1], "spk_a u2");

        let speakers = read_spk2utt(&path).unwrap();
        assert_eq!(speakers["spk_b"], vec!["u1", "u3"]);
        assert_eq!(speakers["spk_a"], vec!["u2"]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
