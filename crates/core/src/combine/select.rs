//! Combination selection: drawing member sets for long-form recipes.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::PipelineError;
use crate::types::{Label, Recipe, RecipeMember, Utterance};

/// How member utterances are pooled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Members drawn from the whole corpus.
    Pooled,
    /// All members of a recipe come from one speaker.
    SpeakerConsistent,
}

impl SelectionMode {
    /// Short tag used in the recipe metadata file name.
    pub fn tag(&self) -> &'static str {
        match self {
            SelectionMode::Pooled => "mc",
            SelectionMode::SpeakerConsistent => "sc",
        }
    }

    /// Speaker column value recorded for generated waveforms.
    pub fn speaker_tag(&self) -> &'static str {
        match self {
            SelectionMode::Pooled => "multi",
            SelectionMode::SpeakerConsistent => "single",
        }
    }
}

/// Recipe counts and shapes for one selection run.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub num_bonafide_recipes: usize,
    pub num_spoof_recipes: usize,
    /// Bonafide members per spoof recipe. Bonafide recipes use
    /// `k_bonafide + k_spoof` members, all bonafide.
    pub k_bonafide: usize,
    pub k_spoof: usize,
    pub prefix: String,
    /// Speaker redraw ceiling in speaker-consistent mode.
    pub max_retries: usize,
}

impl Default for SelectorConfig {
    fn default() -> SelectorConfig {
        SelectorConfig {
            num_bonafide_recipes: 2580,
            num_spoof_recipes: 22800,
            k_bonafide: 3,
            k_spoof: 7,
            prefix: "LF".to_string(),
            max_retries: 1000,
        }
    }
}

/// Recipe metadata file name for one mode and member shape.
pub fn metadata_file_name(mode: SelectionMode, k_bonafide: usize, k_spoof: usize) -> String {
    format!("src_comb_metadata_{}_{}_{}.txt", mode.tag(), k_bonafide, k_spoof)
}

fn to_member(u: &Utterance) -> RecipeMember {
    RecipeMember {
        id: u.id.clone(),
        duration: u.duration,
        label: u.label,
    }
}

fn bonafide_id(prefix: &str, k: usize, index: usize) -> String {
    format!("{}_bonafide_{}_{}", prefix, k, index)
}

fn spoof_id(prefix: &str, k_bonafide: usize, k_spoof: usize, index: usize) -> String {
    format!("{}_spoof_{}_{}_{}", prefix, k_bonafide, k_spoof, index)
}

/// Draw recipes from corpus-wide bonafide and spoof pools.
///
/// Sampling is without replacement within a recipe and with replacement
/// across recipes. Member order is shuffled.
pub fn select_recipes(
    config: &SelectorConfig,
    bonafide: &[Utterance],
    spoof: &[Utterance],
    rng: &mut StdRng,
) -> Result<Vec<Recipe>> {
    let k_total = config.k_bonafide + config.k_spoof;
    if config.num_bonafide_recipes > 0 && bonafide.len() < k_total {
        bail!(
            "bonafide pool has {} utterances, need {} per bonafide recipe",
            bonafide.len(),
            k_total
        );
    }
    if config.num_spoof_recipes > 0 && (bonafide.len() < config.k_bonafide || spoof.len() < config.k_spoof)
    {
        bail!(
            "pools too small for spoof recipes: {} bonafide / {} spoof available, need {} / {}",
            bonafide.len(),
            spoof.len(),
            config.k_bonafide,
            config.k_spoof
        );
    }

    let mut recipes = Vec::with_capacity(config.num_bonafide_recipes + config.num_spoof_recipes);
    for i in 0..config.num_bonafide_recipes {
        let mut members: Vec<RecipeMember> =
            bonafide.choose_multiple(rng, k_total).map(to_member).collect();
        members.shuffle(rng);
        let decision = Recipe::decision_for(&members);
        recipes.push(Recipe {
            id: bonafide_id(&config.prefix, k_total, i),
            members,
            decision,
        });
    }
    for i in 0..config.num_spoof_recipes {
        let mut members: Vec<RecipeMember> = bonafide
            .choose_multiple(rng, config.k_bonafide)
            .chain(spoof.choose_multiple(rng, config.k_spoof))
            .map(to_member)
            .collect();
        members.shuffle(rng);
        let decision = Recipe::decision_for(&members);
        recipes.push(Recipe {
            id: spoof_id(&config.prefix, config.k_bonafide, config.k_spoof, i),
            members,
            decision,
        });
    }
    Ok(recipes)
}

/// Draw recipes whose members all come from one speaker.
///
/// A uniformly drawn speaker whose pools are too small is redrawn, up to
/// `max_retries` per recipe.
pub fn select_recipes_by_speaker(
    config: &SelectorConfig,
    by_speaker: &HashMap<String, Vec<Utterance>>,
    rng: &mut StdRng,
) -> Result<Vec<Recipe>> {
    // Sorted so the draw sequence is stable under a fixed seed.
    let mut speakers: Vec<&String> = by_speaker.keys().collect();
    speakers.sort();

    let k_total = config.k_bonafide + config.k_spoof;
    let mut recipes = Vec::with_capacity(config.num_bonafide_recipes + config.num_spoof_recipes);
    for i in 0..config.num_bonafide_recipes {
        let members = draw_from_one_speaker(
            &speakers,
            by_speaker,
            k_total,
            0,
            config.max_retries,
            "bonafide",
            rng,
        )?;
        let decision = Recipe::decision_for(&members);
        recipes.push(Recipe {
            id: bonafide_id(&config.prefix, k_total, i),
            members,
            decision,
        });
    }
    for i in 0..config.num_spoof_recipes {
        let members = draw_from_one_speaker(
            &speakers,
            by_speaker,
            config.k_bonafide,
            config.k_spoof,
            config.max_retries,
            "spoof",
            rng,
        )?;
        let decision = Recipe::decision_for(&members);
        recipes.push(Recipe {
            id: spoof_id(&config.prefix, config.k_bonafide, config.k_spoof, i),
            members,
            decision,
        });
    }
    Ok(recipes)
}

fn draw_from_one_speaker(
    speakers: &[&String],
    by_speaker: &HashMap<String, Vec<Utterance>>,
    need_bonafide: usize,
    need_spoof: usize,
    max_retries: usize,
    kind: &str,
    rng: &mut StdRng,
) -> Result<Vec<RecipeMember>> {
    for _ in 0..max_retries {
        let Some(speaker) = speakers.choose(rng) else {
            break;
        };
        let utts = &by_speaker[speaker.as_str()];
        let bonafide: Vec<&Utterance> =
            utts.iter().filter(|u| u.label == Label::Bonafide).collect();
        let spoof: Vec<&Utterance> = utts.iter().filter(|u| u.label == Label::Spoof).collect();
        if bonafide.len() < need_bonafide || spoof.len() < need_spoof {
            continue;
        }
        let mut members: Vec<RecipeMember> = bonafide
            .choose_multiple(rng, need_bonafide)
            .chain(spoof.choose_multiple(rng, need_spoof))
            .map(|u| to_member(u))
            .collect();
        members.shuffle(rng);
        return Ok(members);
    }
    Err(PipelineError::PoolExhausted {
        kind: kind.to_string(),
        retries: max_retries,
    }
    .into())
}

/// Write a recipe metadata file, one line per recipe.
pub fn write_recipes(path: &Path, recipes: &[Recipe]) -> Result<()> {
    let mut out = String::new();
    for recipe in recipes {
        let _ = writeln!(out, "{}", recipe.metadata_line());
    }
    std::fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Read a recipe metadata file written by [`write_recipes`].
pub fn read_recipes(path: &Path) -> Result<Vec<Recipe>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(Recipe::parse_line)
        .collect::<Result<Vec<Recipe>>>()
        .with_context(|| format!("Malformed recipe file {}", path.display()))
}
