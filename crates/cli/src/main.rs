//! Ultrafake CLI — long-form speech-deepfake corpus assembly.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ultrafake_core::combine::{CombineConfig, SelectorConfig, run_combine};
use ultrafake_core::corpus::export::{sample_rows, write_eval_csv};
use ultrafake_core::corpus::ledger::{write_spk2utt, write_utt2dur};
use ultrafake_core::corpus::{CorpusIndex, check_data_dir};
use ultrafake_core::noise::{NoiseConfig, run_noise};
use ultrafake_core::segment::run_segment;

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ultrafake",
    about = "Long-form speech-deepfake corpus assembly pipeline",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select source combinations and concatenate long-form waveforms
    Combine(CombineArgs),
    /// Cut long-form waveforms into fixed-length relabeled windows
    Segment(SegmentArgs),
    /// Inject additive noise at a target SNR
    Noise(NoiseArgs),
    /// Export the evaluation CSV
    Export(ExportArgs),
    /// Subsample rows of the evaluation CSV
    Sample(SampleArgs),
    /// Generate the spk2utt speaker ledger
    Spk2utt(LedgerArgs),
    /// Generate the utt2dur duration ledger
    Utt2dur(LedgerArgs),
}

// ─── Shared arguments (embedded in each subcommand) ──────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// Data directory holding data.csv and wavs/
    #[arg(long)]
    in_data_dir: PathBuf,

    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

// ─── Combine ─────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Assemble long-form waveforms from short utterances")]
struct CombineArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Output data directory
    #[arg(long)]
    out_data_dir: PathBuf,

    /// Draw every recipe from a single speaker's utterances
    #[arg(long, default_value_t = false)]
    single_speaker: bool,

    /// Number of all-bonafide recipes
    #[arg(long, default_value_t = 2580)]
    num_bonafides: usize,

    /// Number of mixed spoof recipes
    #[arg(long, default_value_t = 22800)]
    num_spoofs: usize,

    /// Bonafide members per spoof recipe
    #[arg(long, default_value_t = 3)]
    num_bonafides_single: usize,

    /// Spoof members per spoof recipe
    #[arg(long, default_value_t = 7)]
    num_spoofs_single: usize,

    /// Prefix of generated waveform ids
    #[arg(long, default_value = "LF")]
    prefix: String,

    /// Speaker redraw ceiling in single-speaker mode
    #[arg(long, default_value_t = 1000)]
    max_retries: usize,

    /// Pipeline sample rate in Hz
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

// ─── Segment ─────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Re-segment long-form waveforms into windows")]
struct SegmentArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Output data directory
    #[arg(long)]
    out_data_dir: PathBuf,

    /// Window length in seconds
    #[arg(long, default_value_t = 4.0)]
    segment_length: f64,

    /// Pipeline sample rate in Hz
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,
}

// ─── Noise ───────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Add babble, music, or generic noise to waveforms")]
#[command(allow_negative_numbers = true)]
struct NoiseArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Output data directory
    #[arg(long)]
    out_data_dir: PathBuf,

    /// MUSAN-style source tree with noise/, speech/, music/
    #[arg(long)]
    noise_dir: PathBuf,

    /// Lower SNR bound in dB
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    snr_min: f64,

    /// Upper SNR bound in dB
    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    snr_max: f64,

    /// Pipeline sample rate in Hz
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

// ─── Export / Sample ─────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(about = "Export the evaluation CSV for a finished data directory")]
struct ExportArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Sample rate recorded in the CSV
    #[arg(long, default_value_t = 16000)]
    sample_rate: u32,
}

#[derive(Parser, Debug)]
#[command(about = "Draw a seeded row subsample of the evaluation CSV")]
struct SampleArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Number of rows to draw
    #[arg(long, default_value_t = 100000)]
    num_subsamples: usize,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

// ─── Ledgers ─────────────────────────────────────────────────────

#[derive(Parser, Debug)]
struct LedgerArgs {
    #[command(flatten)]
    shared: SharedArgs,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    // Init logging
    let log_level = match &cli.command {
        Command::Combine(a) if a.shared.verbose => "debug",
        Command::Segment(a) if a.shared.verbose => "debug",
        Command::Noise(a) if a.shared.verbose => "debug",
        Command::Export(a) if a.shared.verbose => "debug",
        Command::Sample(a) if a.shared.verbose => "debug",
        Command::Spk2utt(a) if a.shared.verbose => "debug",
        Command::Utt2dur(a) if a.shared.verbose => "debug",
        _ => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Combine(args) => run_combine_cmd(args),
        Command::Segment(args) => run_segment_cmd(args),
        Command::Noise(args) => run_noise_cmd(args),
        Command::Export(args) => run_export_cmd(args),
        Command::Sample(args) => run_sample_cmd(args),
        Command::Spk2utt(args) => run_spk2utt_cmd(args),
        Command::Utt2dur(args) => run_utt2dur_cmd(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Runners ─────────────────────────────────────────────────────

fn run_combine_cmd(args: CombineArgs) -> Result<()> {
    let config = CombineConfig {
        in_data_dir: args.shared.in_data_dir,
        out_data_dir: args.out_data_dir.clone(),
        selector: SelectorConfig {
            num_bonafide_recipes: args.num_bonafides,
            num_spoof_recipes: args.num_spoofs,
            k_bonafide: args.num_bonafides_single,
            k_spoof: args.num_spoofs_single,
            prefix: args.prefix,
            max_retries: args.max_retries,
        },
        speaker_consistent: args.single_speaker,
        sample_rate: args.sample_rate,
        seed: args.seed,
    };
    run_combine(&config)?;
    println!("Output: {}", args.out_data_dir.display());
    Ok(())
}

fn run_segment_cmd(args: SegmentArgs) -> Result<()> {
    run_segment(
        &args.shared.in_data_dir,
        &args.out_data_dir,
        args.segment_length,
        args.sample_rate,
    )?;
    println!("Output: {}", args.out_data_dir.display());
    Ok(())
}

fn run_noise_cmd(args: NoiseArgs) -> Result<()> {
    let config = NoiseConfig {
        in_data_dir: args.shared.in_data_dir,
        out_data_dir: args.out_data_dir.clone(),
        noise_dir: args.noise_dir,
        snr_min: args.snr_min,
        snr_max: args.snr_max,
        sample_rate: args.sample_rate,
        seed: args.seed,
    };
    run_noise(&config)?;
    println!("Output: {}", args.out_data_dir.display());
    Ok(())
}

fn run_export_cmd(args: ExportArgs) -> Result<()> {
    let path = write_eval_csv(&args.shared.in_data_dir, args.sample_rate)?;
    println!("Output: {}", path.display());
    Ok(())
}

fn run_sample_cmd(args: SampleArgs) -> Result<()> {
    let path = sample_rows(&args.shared.in_data_dir, args.num_subsamples, args.seed)?;
    println!("Output: {}", path.display());
    Ok(())
}

fn run_spk2utt_cmd(args: LedgerArgs) -> Result<()> {
    let in_dir = &args.shared.in_data_dir;
    check_data_dir(in_dir, &["data.csv"])?;
    let index = CorpusIndex::load(&in_dir.join("data.csv"))?;
    let out_path = in_dir.join("spk2utt");
    let speakers = write_spk2utt(&index, &out_path)?;
    println!("Wrote {} speakers to {}", speakers, out_path.display());
    Ok(())
}

fn run_utt2dur_cmd(args: LedgerArgs) -> Result<()> {
    let in_dir = &args.shared.in_data_dir;
    check_data_dir(in_dir, &["data.csv"])?;
    let index = CorpusIndex::load(&in_dir.join("data.csv"))?;
    let out_path = in_dir.join("utt2dur");
    let entries = write_utt2dur(&index, in_dir, &out_path)?;
    println!("Wrote {} durations to {}", entries, out_path.display());
    Ok(())
}
