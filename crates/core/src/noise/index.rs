//! Noise source index: the wav inventory of a MUSAN-style directory tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::error::PipelineError;

/// Immutable inventory of noise source files, one list per category.
///
/// Built once from `root/{noise,speech,music}/**/*.wav` and passed to the
/// injection engine. Lists are sorted so file draws are stable under a
/// fixed seed.
#[derive(Debug, Clone)]
pub struct NoiseIndex {
    pub noise: Vec<PathBuf>,
    pub speech: Vec<PathBuf>,
    pub music: Vec<PathBuf>,
}

impl NoiseIndex {
    /// Scan the source tree. Every category directory must exist and hold
    /// at least one wav file.
    pub fn scan(root: &Path) -> Result<NoiseIndex> {
        Ok(NoiseIndex {
            noise: scan_category(root, "noise")?,
            speech: scan_category(root, "speech")?,
            music: scan_category(root, "music")?,
        })
    }

    pub fn total_files(&self) -> usize {
        self.noise.len() + self.speech.len() + self.music.len()
    }
}

fn scan_category(root: &Path, category: &str) -> Result<Vec<PathBuf>> {
    let dir = root.join(category);
    if !dir.is_dir() {
        return Err(PipelineError::MissingPrerequisite {
            dir: root.display().to_string(),
            entry: category.to_string(),
        }
        .into());
    }
    let mut files = Vec::new();
    collect_wavs(&dir, &mut files)?;
    if files.is_empty() {
        bail!("no wav files under {}", dir.display());
    }
    files.sort();
    Ok(files)
}

fn collect_wavs(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            .path();
        if path.is_dir() {
            collect_wavs(&path, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("wav") {
            files.push(path);
        }
    }
    Ok(())
}
