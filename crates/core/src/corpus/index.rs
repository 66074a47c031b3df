//! Corpus index: the `data.csv` file listing every waveform with its label,
//! speaker tag, and attack tag.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::types::Label;

/// One `data.csv` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    pub file: String,
    pub label: String,
    pub speaker: String,
    pub attack: String,
}

impl CorpusRow {
    /// Utterance id: the file stem of the waveform path.
    pub fn utt_id(&self) -> String {
        utt_id_of(&self.file)
    }
}

/// File stem of a waveform path.
pub fn utt_id_of(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file.to_string())
}

/// In-memory `data.csv`: an append-only row list in file order.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    pub rows: Vec<CorpusRow>,
}

impl CorpusIndex {
    pub fn new() -> CorpusIndex {
        CorpusIndex { rows: Vec::new() }
    }

    /// Load `data.csv`.
    ///
    /// A leading unnamed position column, as written by some tabular tools,
    /// is tolerated and skipped.
    pub fn load(path: &Path) -> Result<CorpusIndex> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open corpus index: {}", path.display()))?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: CorpusRow =
                record.with_context(|| format!("Malformed row in {}", path.display()))?;
            rows.push(row);
        }
        Ok(CorpusIndex { rows })
    }

    /// Write the index. No position column is emitted.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create corpus index: {}", path.display()))?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().context("Failed to flush corpus index")?;
        Ok(())
    }

    pub fn push(&mut self, file: String, label: &str, speaker: &str, attack: &str) {
        self.rows.push(CorpusRow {
            file,
            label: label.to_string(),
            speaker: speaker.to_string(),
            attack: attack.to_string(),
        });
    }

    /// Rows carrying the given decision label.
    pub fn rows_with_label(&self, label: Label) -> Vec<&CorpusRow> {
        self.rows
            .iter()
            .filter(|r| r.label == label.as_str())
            .collect()
    }
}

/// Verify stage prerequisites exist under `dir` before any processing.
pub fn check_data_dir(dir: &Path, entries: &[&str]) -> Result<(), PipelineError> {
    for entry in entries {
        if !dir.join(entry).exists() {
            return Err(PipelineError::MissingPrerequisite {
                dir: dir.display().to_string(),
                entry: (*entry).to_string(),
            });
        }
    }
    Ok(())
}
