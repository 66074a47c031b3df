use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ground-truth class of an utterance or a generated waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Bonafide,
    Spoof,
}

impl Label {
    /// Full name used in corpus indexes and trial lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Bonafide => "bonafide",
            Label::Spoof => "spoof",
        }
    }

    /// One-letter code used in recipe metadata lines.
    pub fn code(&self) -> &'static str {
        match self {
            Label::Bonafide => "b",
            Label::Spoof => "s",
        }
    }

    pub fn parse(s: &str) -> Option<Label> {
        match s {
            "bonafide" => Some(Label::Bonafide),
            "spoof" => Some(Label::Spoof),
            _ => None,
        }
    }

    pub fn parse_code(s: &str) -> Option<Label> {
        match s {
            "b" => Some(Label::Bonafide),
            "s" => Some(Label::Spoof),
            _ => None,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short source utterance eligible for combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// File stem, unique within the corpus
    pub id: String,
    pub path: PathBuf,
    /// Duration in seconds from the duration ledger
    pub duration: f64,
    pub label: Label,
    pub speaker: String,
}

/// One member of a combination recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeMember {
    pub id: String,
    /// Ledger duration in seconds
    pub duration: f64,
    pub label: Label,
}

/// A planned long-form waveform: ordered members plus the aggregate decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub members: Vec<RecipeMember>,
    pub decision: Label,
}

impl Recipe {
    /// Aggregate decision: bonafide only when every member is bonafide.
    pub fn decision_for(members: &[RecipeMember]) -> Label {
        if members.iter().all(|m| m.label == Label::Bonafide) {
            Label::Bonafide
        } else {
            Label::Spoof
        }
    }

    /// Sum of ledger durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.members.iter().map(|m| m.duration).sum()
    }

    /// Render the whitespace-delimited metadata line:
    /// `id member_ids member_durations member_labels decision`
    /// with comma-joined member fields.
    pub fn metadata_line(&self) -> String {
        let ids: Vec<&str> = self.members.iter().map(|m| m.id.as_str()).collect();
        let durs: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{:.3}", m.duration))
            .collect();
        let labels: Vec<&str> = self.members.iter().map(|m| m.label.code()).collect();
        format!(
            "{} {} {} {} {}",
            self.id,
            ids.join(","),
            durs.join(","),
            labels.join(","),
            self.decision
        )
    }

    /// Parse one line written by [`Recipe::metadata_line`].
    pub fn parse_line(line: &str) -> Result<Recipe> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            bail!("expected 5 fields in recipe line, got {}: {:?}", fields.len(), line);
        }
        let ids: Vec<&str> = fields[1].split(',').collect();
        let durs: Vec<&str> = fields[2].split(',').collect();
        let labels: Vec<&str> = fields[3].split(',').collect();
        if ids.len() != durs.len() || ids.len() != labels.len() {
            bail!("mismatched member fields in recipe {:?}", fields[0]);
        }

        let mut members = Vec::with_capacity(ids.len());
        for ((id, dur), label) in ids.iter().zip(durs.iter()).zip(labels.iter()) {
            let duration: f64 = dur
                .parse()
                .with_context(|| format!("bad duration {:?} in recipe {}", dur, fields[0]))?;
            let label = Label::parse_code(label)
                .with_context(|| format!("bad member label {:?} in recipe {}", label, fields[0]))?;
            members.push(RecipeMember {
                id: (*id).to_string(),
                duration,
                label,
            });
        }

        let decision = Label::parse(fields[4])
            .with_context(|| format!("bad decision {:?} in recipe {}", fields[4], fields[0]))?;

        Ok(Recipe {
            id: fields[0].to_string(),
            members,
            decision,
        })
    }
}

/// Time span contributed by one member inside a long-form waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceSpan {
    pub member_id: String,
    /// Offset from the start of the long-form waveform, seconds
    pub start: f64,
    pub end: f64,
    pub label: Label,
}

/// Contiguous member spans of one long-form waveform.
///
/// Offsets are running sums of the ledger durations recorded in the recipe,
/// never re-measured from the written audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub spans: Vec<ProvenanceSpan>,
}

impl ProvenanceRecord {
    pub fn from_recipe(recipe: &Recipe) -> ProvenanceRecord {
        let mut spans = Vec::with_capacity(recipe.members.len());
        let mut offset = 0.0;
        for member in &recipe.members {
            spans.push(ProvenanceSpan {
                member_id: member.id.clone(),
                start: offset,
                end: offset + member.duration,
                label: member.label,
            });
            offset += member.duration;
        }
        ProvenanceRecord { spans }
    }

    pub fn total_duration(&self) -> f64 {
        self.spans.last().map(|s| s.end).unwrap_or(0.0)
    }

    /// Seconds of spoof-labeled audio overlapping `[start, end)`.
    pub fn spoof_seconds(&self, start: f64, end: f64) -> f64 {
        self.spans
            .iter()
            .filter(|s| s.label == Label::Spoof)
            .map(|s| (s.end.min(end) - s.start.max(start)).max(0.0))
            .sum()
    }
}

/// One fixed-length window cut from a long-form waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub id: String,
    /// Spoof share of the window, relative to the full window length
    pub portion_spoof: f64,
    pub decision: Label,
}

impl Window {
    /// Render the segment metadata line: `id portion decision`.
    pub fn metadata_line(&self) -> String {
        format!("{} {} {}", self.id, self.portion_spoof, self.decision)
    }
}

/// Augmentation outcome applied to one waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseMethod {
    None,
    Babble,
    Music,
    Noise,
    BabbleMusic,
}

impl NoiseMethod {
    pub fn tag(&self) -> &'static str {
        match self {
            NoiseMethod::None => "-",
            NoiseMethod::Babble => "babble",
            NoiseMethod::Music => "music",
            NoiseMethod::Noise => "noise",
            NoiseMethod::BabbleMusic => "babble-music",
        }
    }

    /// Attack tag recorded in the corpus index.
    pub fn attack(&self) -> String {
        format!("longform-{}", self.tag())
    }
}
