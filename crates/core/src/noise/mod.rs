//! Noise injection: SNR-targeted additive augmentation of finished waveforms.

pub mod index;
pub mod inject;

pub use index::NoiseIndex;
pub use inject::{NoiseConfig, run_noise};
