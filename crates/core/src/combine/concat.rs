//! Concatenation stage: render recipes into long-form waveforms.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::audio::io::{load_audio, write_wav};
use crate::combine::select::{
    SelectionMode, SelectorConfig, metadata_file_name, select_recipes, select_recipes_by_speaker,
    write_recipes,
};
use crate::corpus::index::{CorpusIndex, check_data_dir};
use crate::corpus::ledger::{read_spk2utt, read_utt2dur};
use crate::corpus::trials::write_trials;
use crate::error::PipelineError;
use crate::types::{Label, Utterance};

/// Everything the combine stage needs for one run.
#[derive(Debug, Clone)]
pub struct CombineConfig {
    pub in_data_dir: PathBuf,
    pub out_data_dir: PathBuf,
    pub selector: SelectorConfig,
    /// Constrain every recipe to a single speaker's utterances.
    pub speaker_consistent: bool,
    pub sample_rate: u32,
    pub seed: Option<u64>,
}

/// Run combination selection and concatenation end to end.
///
/// Reads `data.csv`, `utt2dur` (and `spk2utt` in speaker-consistent mode)
/// from the input directory; writes long-form waveforms, the recipe metadata
/// file, `trials.txt`, a fresh `data.csv`, and `manifest.json` under the
/// output directory.
pub fn run_combine(config: &CombineConfig) -> Result<()> {
    let in_dir = &config.in_data_dir;
    let out_dir = &config.out_data_dir;

    let mut prerequisites = vec!["data.csv", "wavs", "utt2dur"];
    if config.speaker_consistent {
        prerequisites.push("spk2utt");
    }
    check_data_dir(in_dir, &prerequisites)?;

    let index = CorpusIndex::load(&in_dir.join("data.csv"))?;
    let durations = read_utt2dur(&in_dir.join("utt2dur"))?;

    let mut utterances: Vec<Utterance> = Vec::with_capacity(index.rows.len());
    for row in &index.rows {
        let id = row.utt_id();
        let label = Label::parse(&row.label).ok_or_else(|| PipelineError::MalformedLabel {
            file: row.file.clone(),
            label: row.label.clone(),
        })?;
        let Some(&duration) = durations.get(&id) else {
            log::warn!("No duration for {}, excluding from pool", id);
            continue;
        };
        utterances.push(Utterance {
            id,
            path: in_dir.join(&row.file),
            duration,
            label,
            speaker: row.speaker.clone(),
        });
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mode = if config.speaker_consistent {
        SelectionMode::SpeakerConsistent
    } else {
        SelectionMode::Pooled
    };

    let by_id: HashMap<&str, &Utterance> =
        utterances.iter().map(|u| (u.id.as_str(), u)).collect();

    let recipes = if config.speaker_consistent {
        let speakers = read_spk2utt(&in_dir.join("spk2utt"))?;
        let mut by_speaker: HashMap<String, Vec<Utterance>> = HashMap::new();
        for (speaker, utts) in speakers {
            let pool: Vec<Utterance> = utts
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).map(|u| (*u).clone()))
                .collect();
            if !pool.is_empty() {
                by_speaker.insert(speaker, pool);
            }
        }
        select_recipes_by_speaker(&config.selector, &by_speaker, &mut rng)?
    } else {
        let bonafide: Vec<Utterance> = utterances
            .iter()
            .filter(|u| u.label == Label::Bonafide)
            .cloned()
            .collect();
        let spoof: Vec<Utterance> = utterances
            .iter()
            .filter(|u| u.label == Label::Spoof)
            .cloned()
            .collect();
        select_recipes(&config.selector, &bonafide, &spoof, &mut rng)?
    };
    log::info!("Selected {} recipes in {} mode", recipes.len(), mode.tag());

    let wav_dir = out_dir.join("wavs");
    std::fs::create_dir_all(&wav_dir)
        .with_context(|| format!("Failed to create directory: {}", wav_dir.display()))?;

    let metadata_path = out_dir.join(metadata_file_name(
        mode,
        config.selector.k_bonafide,
        config.selector.k_spoof,
    ));
    write_recipes(&metadata_path, &recipes)?;

    let mut out_index = CorpusIndex::new();
    let mut trials: Vec<(String, Label)> = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        let mut samples: Vec<f64> = Vec::new();
        for member in &recipe.members {
            let Some(utterance) = by_id.get(member.id.as_str()) else {
                log::warn!("No source file for member {}, skipping", member.id);
                continue;
            };
            match load_audio(&utterance.path, config.sample_rate) {
                Ok(member_samples) => samples.extend(member_samples),
                Err(e) => {
                    log::warn!("Failed to load {}: {:#}", utterance.path.display(), e);
                }
            }
        }
        if samples.is_empty() {
            log::warn!("No members could be loaded for {}, skipping", recipe.id);
            continue;
        }
        let wav_file = format!("wavs/{}.wav", recipe.id);
        write_wav(&out_dir.join(&wav_file), &samples, config.sample_rate)?;
        out_index.push(wav_file, recipe.decision.as_str(), mode.speaker_tag(), "longform");
        trials.push((recipe.id.clone(), recipe.decision));
    }

    write_trials(&out_dir.join("trials.txt"), &trials)?;
    out_index.save(&out_dir.join("data.csv"))?;

    let manifest = serde_json::json!({
        "stage": "combine",
        "mode": mode.tag(),
        "seed": config.seed,
        "sample_rate": config.sample_rate,
        "num_bonafide_recipes": config.selector.num_bonafide_recipes,
        "num_spoof_recipes": config.selector.num_spoof_recipes,
        "k_bonafide": config.selector.k_bonafide,
        "k_spoof": config.selector.k_spoof,
        "waveforms": out_index.rows.len(),
    });
    let manifest_path = out_dir.join("manifest.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

    log::info!(
        "Wrote {} long-form waveforms to {}",
        out_index.rows.len(),
        out_dir.display()
    );
    Ok(())
}
