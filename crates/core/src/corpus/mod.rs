//! Corpus bookkeeping: the `data.csv` index, duration and speaker ledgers,
//! trial lists, and the evaluation CSV export.

pub mod export;
pub mod index;
pub mod ledger;
pub mod trials;

pub use index::{CorpusIndex, CorpusRow, check_data_dir};
