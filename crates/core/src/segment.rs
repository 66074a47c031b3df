//! Re-segmentation stage: cut long-form waveforms into fixed-length windows
//! and relabel each window from its provenance.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::audio::io::{load_audio, write_wav};
use crate::combine::select::read_recipes;
use crate::corpus::index::{CorpusIndex, check_data_dir};
use crate::corpus::trials::write_trials;
use crate::error::PipelineError;
use crate::types::{Label, ProvenanceRecord, Recipe, Window};

/// Name of the per-window metadata file written by the stage.
pub const SEGMENT_METADATA: &str = "segment_comb_metadata.txt";

/// Locate the recipe metadata file left by the combine stage.
fn find_recipe_file(dir: &Path) -> Result<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    let mut candidates: Vec<std::path::PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("src_comb_metadata") && n.ends_with(".txt"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();
    match candidates.len() {
        0 => Err(PipelineError::MissingPrerequisite {
            dir: dir.display().to_string(),
            entry: "src_comb_metadata*.txt".to_string(),
        }
        .into()),
        1 => Ok(candidates.remove(0)),
        _ => {
            log::warn!(
                "Multiple recipe metadata files in {}, using {}",
                dir.display(),
                candidates[0].display()
            );
            Ok(candidates.remove(0))
        }
    }
}

/// Windows for one long-form waveform.
///
/// The raw walk over the sample buffer governs the window count; the label
/// walk over the provenance ledger assigns each window its spoof share.
/// Every window, including a short final one, divides by the full window
/// length, and windows past the ledger's end carry a zero share.
pub fn label_windows(recipe: &Recipe, window_count: usize, window_len: f64) -> Vec<Window> {
    let record = ProvenanceRecord::from_recipe(recipe);
    (0..window_count)
        .map(|i| {
            let start = i as f64 * window_len;
            let portion_spoof = record.spoof_seconds(start, start + window_len) / window_len;
            let decision = if portion_spoof > 0.0 {
                Label::Spoof
            } else {
                Label::Bonafide
            };
            Window {
                id: format!("{}_{}", recipe.id, i + 1),
                portion_spoof,
                decision,
            }
        })
        .collect()
}

/// Run re-segmentation over a combine-stage output directory.
///
/// Reads `data.csv`, `wavs/` and the recipe metadata file from the input
/// directory; writes window waveforms, `segment_comb_metadata.txt`,
/// `trials.txt`, and a fresh `data.csv` under the output directory.
pub fn run_segment(
    in_data_dir: &Path,
    out_data_dir: &Path,
    segment_length: f64,
    sample_rate: u32,
) -> Result<()> {
    check_data_dir(in_data_dir, &["data.csv", "wavs"])?;
    let recipe_path = find_recipe_file(in_data_dir)?;
    let recipes = read_recipes(&recipe_path)?;

    let segment_samples = (segment_length * sample_rate as f64).round() as usize;
    if segment_samples == 0 {
        bail!("segment length {} s yields zero samples", segment_length);
    }

    let wav_dir = out_data_dir.join("wavs");
    std::fs::create_dir_all(&wav_dir)
        .with_context(|| format!("Failed to create directory: {}", wav_dir.display()))?;

    let mut metadata = String::new();
    let mut out_index = CorpusIndex::new();
    let mut trials: Vec<(String, Label)> = Vec::new();
    for recipe in &recipes {
        let wav_path = in_data_dir.join(format!("wavs/{}.wav", recipe.id));
        let samples = match load_audio(&wav_path, sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                log::warn!("Failed to load {}: {:#}", wav_path.display(), e);
                continue;
            }
        };

        let chunks: Vec<&[f64]> = samples.chunks(segment_samples).collect();
        let windows = label_windows(recipe, chunks.len(), segment_length);
        for (chunk, window) in chunks.iter().zip(windows.iter()) {
            let wav_file = format!("wavs/{}.wav", window.id);
            write_wav(&out_data_dir.join(&wav_file), chunk, sample_rate)?;
            let _ = writeln!(metadata, "{}", window.metadata_line());
            out_index.push(wav_file, window.decision.as_str(), "segment_spk", "longform");
            trials.push((window.id.clone(), window.decision));
        }
    }

    std::fs::write(out_data_dir.join(SEGMENT_METADATA), metadata)
        .with_context(|| format!("Failed to write {}", SEGMENT_METADATA))?;
    write_trials(&out_data_dir.join("trials.txt"), &trials)?;
    out_index.save(&out_data_dir.join("data.csv"))?;

    log::info!(
        "Wrote {} windows from {} long-form waveforms to {}",
        out_index.rows.len(),
        recipes.len(),
        out_data_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::io::get_wav_duration;
    use crate::combine::select::write_recipes;
    use crate::types::RecipeMember;
    use std::path::PathBuf;

    const SR: u32 = 1000;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("ultrafake_test_segment").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn recipe_8_5s() -> Recipe {
        Recipe {
            id: "LF_spoof_1_1_0".into(),
            members: vec![
                RecipeMember {
                    id: "u1".into(),
                    duration: 5.5,
                    label: Label::Bonafide,
                },
                RecipeMember {
                    id: "u2".into(),
                    duration: 3.0,
                    label: Label::Spoof,
                },
            ],
            decision: Label::Spoof,
        }
    }

    #[test]
    fn test_label_windows_8_5s_scenario() {
        let windows = label_windows(&recipe_8_5s(), 3, 4.0);
        assert_eq!(windows.len(), 3);

        assert!((windows[0].portion_spoof - 0.0).abs() < 1e-9);
        assert_eq!(windows[0].decision, Label::Bonafide);

        // Spoof spans [5.5, 8.5): 2.5 s inside [4, 8).
        assert!((windows[1].portion_spoof - 0.625).abs() < 1e-9);
        assert_eq!(windows[1].decision, Label::Spoof);

        // Final short window still divides by the full window length.
        assert!((windows[2].portion_spoof - 0.125).abs() < 1e-9);
        assert_eq!(windows[2].decision, Label::Spoof);

        assert_eq!(windows[0].id, "LF_spoof_1_1_0_1");
        assert_eq!(windows[2].id, "LF_spoof_1_1_0_3");
    }

    #[test]
    fn test_label_windows_beyond_ledger_are_bonafide() {
        let windows = label_windows(&recipe_8_5s(), 5, 4.0);
        assert!((windows[3].portion_spoof - 0.0).abs() < 1e-9);
        assert_eq!(windows[3].decision, Label::Bonafide);
        assert!((windows[4].portion_spoof - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_segment_outputs() {
        let root = temp_dir("outputs");
        let in_dir = root.join("in");
        let out_dir = root.join("out");
        std::fs::create_dir_all(&in_dir).unwrap();

        let recipe = recipe_8_5s();
        write_recipes(&in_dir.join("src_comb_metadata_mc_1_1.txt"), &[recipe.clone()]).unwrap();

        let samples = vec![0.1; (8.5 * SR as f64) as usize];
        write_wav(&in_dir.join("wavs/LF_spoof_1_1_0.wav"), &samples, SR).unwrap();

        let mut index = CorpusIndex::new();
        index.push("wavs/LF_spoof_1_1_0.wav".into(), "spoof", "multi", "longform");
        index.save(&in_dir.join("data.csv")).unwrap();

        run_segment(&in_dir, &out_dir, 4.0, SR).unwrap();

        // ceil(8.5 / 4.0) windows of 4.0, 4.0, 0.5 seconds.
        let out_index = CorpusIndex::load(&out_dir.join("data.csv")).unwrap();
        assert_eq!(out_index.rows.len(), 3);
        assert_eq!(out_index.rows[0].speaker, "segment_spk");
        assert_eq!(out_index.rows[0].attack, "longform");
        assert_eq!(out_index.rows[0].label, "bonafide");
        assert_eq!(out_index.rows[1].label, "spoof");
        assert_eq!(out_index.rows[2].label, "spoof");

        let d1 = get_wav_duration(&out_dir.join("wavs/LF_spoof_1_1_0_1.wav")).unwrap();
        let d3 = get_wav_duration(&out_dir.join("wavs/LF_spoof_1_1_0_3.wav")).unwrap();
        assert!((d1 - 4.0).abs() < 1e-3);
        assert!((d3 - 0.5).abs() < 1e-3);

        let metadata = std::fs::read_to_string(out_dir.join(SEGMENT_METADATA)).unwrap();
        let lines: Vec<&str> = metadata.lines().collect();
        assert_eq!(lines.len(), 3);
        let fields: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(fields[0], "LF_spoof_1_1_0_2");
        assert!((fields[1].parse::<f64>().unwrap() - 0.625).abs() < 1e-9);
        assert_eq!(fields[2], "spoof");

        let trials = std::fs::read_to_string(out_dir.join("trials.txt")).unwrap();
        assert_eq!(trials.lines().count(), 3);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_run_segment_requires_recipe_file() {
        let root = temp_dir("no_recipes");
        let in_dir = root.join("in");
        std::fs::create_dir_all(in_dir.join("wavs")).unwrap();
        std::fs::write(in_dir.join("data.csv"), "file,label,speaker,attack\n").unwrap();

        let err = run_segment(&in_dir, &root.join("out"), 4.0, SR).unwrap_err();
        assert!(err.to_string().contains("src_comb_metadata"));

        std::fs::remove_dir_all(&root).ok();
    }
}
