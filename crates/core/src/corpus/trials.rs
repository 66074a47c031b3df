//! Trial list output: one `id id - - decision` line per generated waveform.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::Label;

/// Format a single trial line.
pub fn trial_line(id: &str, decision: Label) -> String {
    format!("{} {} - - {}", id, id, decision)
}

/// Write `trials.txt` for the given entries, in order.
pub fn write_trials(path: &Path, entries: &[(String, Label)]) -> Result<()> {
    let mut out = String::new();
    for (id, decision) in entries {
        let _ = writeln!(out, "{}", trial_line(id, *decision));
    }
    std::fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
