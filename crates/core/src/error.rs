//! Fatal error taxonomy shared by the pipeline stages.
//!
//! Everything else (a missing member file, an unreadable noise sample, a
//! corpus row without a ledger entry) is recoverable: it is logged and the
//! offending item is skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required file or directory is absent from the input data directory.
    #[error("missing prerequisite {entry:?} in {dir}")]
    MissingPrerequisite { dir: String, entry: String },

    /// A corpus label outside the accepted vocabulary.
    #[error("unrecognized label {label:?} in {file}")]
    MalformedLabel { file: String, label: String },

    /// Speaker-constrained sampling ran out of usable speakers.
    #[error("no speaker with enough utterances for {kind} recipes after {retries} retries")]
    PoolExhausted { kind: String, retries: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prerequisite_message() {
        let e = PipelineError::MissingPrerequisite {
            dir: "data/train".into(),
            entry: "utt2dur".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("utt2dur"));
        assert!(msg.contains("data/train"));
    }

    #[test]
    fn test_malformed_label_message() {
        let e = PipelineError::MalformedLabel {
            file: "wavs/u1.wav".into(),
            label: "genuine".into(),
        };
        assert!(e.to_string().contains("genuine"));
    }

    #[test]
    fn test_pool_exhausted_message() {
        let e = PipelineError::PoolExhausted {
            kind: "spoof".into(),
            retries: 1000,
        };
        let msg = e.to_string();
        assert!(msg.contains("spoof"));
        assert!(msg.contains("1000"));
    }
}
