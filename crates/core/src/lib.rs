//! Ultrafake core — long-form speech-deepfake corpus construction.
//!
//! Three batch stages, each operating on a data directory with a `data.csv`
//! index and a `wavs/` tree:
//! - `combine`: sample recipes of short utterances and concatenate them into
//!   long-form waveforms with provenance metadata.
//! - `segment`: re-cut long-form waveforms into fixed-length windows with
//!   time-weighted relabeling.
//! - `noise`: inject SNR-controlled background noise.
//!
//! Stages communicate only through files, so each can be re-run on its own.

pub mod audio;
pub mod combine;
pub mod corpus;
pub mod error;
pub mod noise;
pub mod segment;
pub mod types;
