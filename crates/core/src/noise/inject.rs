//! Noise injection stage: additive mixing at a target SNR.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::audio::analysis::{compute_rms, tile_to_length};
use crate::audio::io::{load_audio, read_wav, write_wav};
use crate::corpus::index::{CorpusIndex, check_data_dir};
use crate::noise::index::NoiseIndex;
use crate::types::NoiseMethod;

/// Everything the noise stage needs for one run.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    pub in_data_dir: PathBuf,
    pub out_data_dir: PathBuf,
    /// MUSAN-style source tree with `noise/`, `speech/`, `music/`.
    pub noise_dir: PathBuf,
    pub snr_min: f64,
    pub snr_max: f64,
    pub sample_rate: u32,
    pub seed: Option<u64>,
}

/// Add `noise` to `signal` in place at the given SNR.
///
/// The noise is tiled to the signal length and scaled so its RMS lands at
/// `rms(signal) / 10^(snr/20)`. The sum is written back without clipping
/// or limiting.
pub fn mix_noise(signal: &mut [f64], noise: &[f64], snr_db: f64) {
    let tiled = tile_to_length(noise, signal.len());
    let target_rms = compute_rms(signal) / 10f64.powf(snr_db / 20.0);
    let gain = target_rms / compute_rms(&tiled);
    for (sample, noise_sample) in signal.iter_mut().zip(tiled.iter()) {
        *sample += noise_sample * gain;
    }
}

/// One of five equally likely outcomes per waveform.
fn draw_method(rng: &mut StdRng) -> NoiseMethod {
    match rng.gen_range(0..5u8) {
        0 => NoiseMethod::None,
        1 => NoiseMethod::Babble,
        2 => NoiseMethod::Music,
        3 => NoiseMethod::Noise,
        _ => NoiseMethod::BabbleMusic,
    }
}

fn speech_draw(rng: &mut StdRng) -> usize {
    rng.gen_range(3..=8)
}

fn mix_from(
    samples: &mut [f64],
    files: &[PathBuf],
    count: usize,
    config: &NoiseConfig,
    rng: &mut StdRng,
) {
    let picks: Vec<&PathBuf> = files.choose_multiple(rng, count).collect();
    for path in picks {
        let noise = match read_wav(path) {
            Ok((noise, _sr)) => noise,
            Err(e) => {
                log::warn!("Failed to read noise source {}: {:#}", path.display(), e);
                continue;
            }
        };
        let snr_db = rng.gen_range(config.snr_min..=config.snr_max);
        mix_noise(samples, &noise, snr_db);
    }
}

fn apply_method(
    samples: &mut [f64],
    method: NoiseMethod,
    sources: &NoiseIndex,
    config: &NoiseConfig,
    rng: &mut StdRng,
) {
    match method {
        NoiseMethod::None => {}
        NoiseMethod::Babble => {
            let count = speech_draw(rng);
            mix_from(samples, &sources.speech, count, config, rng);
        }
        NoiseMethod::Music => mix_from(samples, &sources.music, 1, config, rng),
        NoiseMethod::Noise => mix_from(samples, &sources.noise, 1, config, rng),
        NoiseMethod::BabbleMusic => {
            let count = speech_draw(rng);
            mix_from(samples, &sources.speech, count, config, rng);
            mix_from(samples, &sources.music, 1, config, rng);
        }
    }
}

/// Run noise injection over a finished data directory.
///
/// Every indexed waveform draws one of five outcomes; the no-op outcome
/// copies the file through bit-identical. The applied method lands in the
/// attack column of the output `data.csv`. `spk2utt` is carried over when
/// present.
pub fn run_noise(config: &NoiseConfig) -> Result<()> {
    let in_dir = &config.in_data_dir;
    let out_dir = &config.out_data_dir;
    check_data_dir(in_dir, &["data.csv", "wavs"])?;

    let sources = NoiseIndex::scan(&config.noise_dir)?;
    log::info!(
        "Indexed {} noise source files under {}",
        sources.total_files(),
        config.noise_dir.display()
    );

    let index = CorpusIndex::load(&in_dir.join("data.csv"))?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let wav_dir = out_dir.join("wavs");
    std::fs::create_dir_all(&wav_dir)
        .with_context(|| format!("Failed to create directory: {}", wav_dir.display()))?;

    let mut out_index = CorpusIndex::new();
    for row in &index.rows {
        let in_wav = in_dir.join(&row.file);
        let out_wav = out_dir.join(&row.file);
        let method = draw_method(&mut rng);

        if method == NoiseMethod::None {
            // i16 -> f64 -> i16 is not byte-stable, so a plain copy keeps
            // the no-op outcome bit-identical.
            if let Err(e) = std::fs::copy(&in_wav, &out_wav) {
                log::warn!("Failed to copy {}: {}", in_wav.display(), e);
                continue;
            }
        } else {
            let mut samples = match load_audio(&in_wav, config.sample_rate) {
                Ok(samples) => samples,
                Err(e) => {
                    log::warn!("Failed to load {}: {:#}", in_wav.display(), e);
                    continue;
                }
            };
            apply_method(&mut samples, method, &sources, config, &mut rng);
            write_wav(&out_wav, &samples, config.sample_rate)?;
        }
        out_index.push(row.file.clone(), &row.label, &row.speaker, &method.attack());
    }

    out_index.save(&out_dir.join("data.csv"))?;
    let spk2utt = in_dir.join("spk2utt");
    if spk2utt.exists() {
        std::fs::copy(&spk2utt, out_dir.join("spk2utt"))
            .with_context(|| format!("Failed to copy {}", spk2utt.display()))?;
    }

    log::info!(
        "Augmented {} waveforms into {}",
        out_index.rows.len(),
        out_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SR: u32 = 8000;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("ultrafake_test_inject").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sine(len: usize, amplitude: f64) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (i as f64 * 0.05).sin())
            .collect()
    }

    fn seed_noise_tree(root: &Path) {
        for (category, n) in [("noise", 2), ("speech", 9), ("music", 2)] {
            for i in 0..n {
                let samples = sine(SR as usize / 4, 0.3);
                write_wav(
                    &root.join(format!("{}/{}_{}.wav", category, category, i)),
                    &samples,
                    SR,
                )
                .unwrap();
            }
        }
    }

    fn seed_data_dir(dir: &Path, count: usize) -> CorpusIndex {
        let mut index = CorpusIndex::new();
        for i in 0..count {
            let samples = sine(SR as usize, 0.5);
            write_wav(&dir.join(format!("wavs/u{}.wav", i)), &samples, SR).unwrap();
            let label = if i % 2 == 0 { "bonafide" } else { "spoof" };
            index.push(format!("wavs/u{}.wav", i), label, "multi", "longform");
        }
        index.save(&dir.join("data.csv")).unwrap();
        index
    }

    fn config(in_dir: &Path, out_dir: &Path, noise_dir: &Path) -> NoiseConfig {
        NoiseConfig {
            in_data_dir: in_dir.to_path_buf(),
            out_data_dir: out_dir.to_path_buf(),
            noise_dir: noise_dir.to_path_buf(),
            snr_min: 5.0,
            snr_max: 20.0,
            sample_rate: SR,
            seed: Some(42),
        }
    }

    #[test]
    fn test_mix_noise_hits_target_snr() {
        let signal = sine(16000, 0.5);
        let noise = sine(3000, 0.2);
        for snr_db in [0.0, 10.0, 25.0] {
            let mut mixed = signal.clone();
            mix_noise(&mut mixed, &noise, snr_db);
            let added: Vec<f64> = mixed
                .iter()
                .zip(signal.iter())
                .map(|(m, s)| m - s)
                .collect();
            let achieved = 20.0 * (compute_rms(&signal) / compute_rms(&added)).log10();
            assert!(
                (achieved - snr_db).abs() < 0.5,
                "target {} dB, achieved {} dB",
                snr_db,
                achieved
            );
        }
    }

    #[test]
    fn test_mix_noise_tiles_short_noise() {
        let mut signal = vec![0.0; 1000];
        let noise = vec![0.1; 64];
        mix_noise(&mut signal, &noise, 10.0);
        // Every output sample received a noise contribution.
        assert!(signal.iter().all(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_run_noise_outputs() {
        let root = temp_dir("outputs");
        let in_dir = root.join("in");
        let out_dir = root.join("out");
        let noise_dir = root.join("musan");
        std::fs::create_dir_all(&in_dir).unwrap();
        seed_noise_tree(&noise_dir);
        let in_index = seed_data_dir(&in_dir, 40);
        std::fs::write(in_dir.join("spk2utt"), "multi u0 u1\n").unwrap();

        run_noise(&config(&in_dir, &out_dir, &noise_dir)).unwrap();

        let out_index = CorpusIndex::load(&out_dir.join("data.csv")).unwrap();
        assert_eq!(out_index.rows.len(), in_index.rows.len());

        let valid_attacks = [
            "longform--",
            "longform-babble",
            "longform-music",
            "longform-noise",
            "longform-babble-music",
        ];
        for row in &out_index.rows {
            assert!(
                valid_attacks.contains(&row.attack.as_str()),
                "unexpected attack tag {}",
                row.attack
            );
            assert!(out_dir.join(&row.file).exists());
            // The no-op outcome passes the file through untouched.
            if row.attack == "longform--" {
                let original = std::fs::read(in_dir.join(&row.file)).unwrap();
                let copied = std::fs::read(out_dir.join(&row.file)).unwrap();
                assert_eq!(original, copied, "{} was modified", row.file);
            }
        }

        assert!(out_dir.join("spk2utt").exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_run_noise_deterministic_under_seed() {
        let root = temp_dir("deterministic");
        let in_dir = root.join("in");
        let noise_dir = root.join("musan");
        std::fs::create_dir_all(&in_dir).unwrap();
        seed_noise_tree(&noise_dir);
        seed_data_dir(&in_dir, 10);

        let out_a = root.join("out_a");
        let out_b = root.join("out_b");
        run_noise(&config(&in_dir, &out_a, &noise_dir)).unwrap();
        run_noise(&config(&in_dir, &out_b, &noise_dir)).unwrap();

        let csv_a = std::fs::read_to_string(out_a.join("data.csv")).unwrap();
        let csv_b = std::fs::read_to_string(out_b.join("data.csv")).unwrap();
        assert_eq!(csv_a, csv_b);

        let index = CorpusIndex::load(&out_a.join("data.csv")).unwrap();
        for row in &index.rows {
            let wav_a = std::fs::read(out_a.join(&row.file)).unwrap();
            let wav_b = std::fs::read(out_b.join(&row.file)).unwrap();
            assert_eq!(wav_a, wav_b, "{} differs between runs", row.file);
        }

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_run_noise_missing_prerequisite() {
        let root = temp_dir("missing");
        let in_dir = root.join("in");
        std::fs::create_dir_all(&in_dir).unwrap();

        let err = run_noise(&config(&in_dir, &root.join("out"), &root.join("musan"))).unwrap_err();
        assert!(err.to_string().contains("data.csv"));

        std::fs::remove_dir_all(&root).ok();
    }
}
