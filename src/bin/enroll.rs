//! cipherface-enroll: key generation and gallery enrollment
//!
//! Generates a fresh BFV key set, writes the four key files, and encrypts
//! every template in `gallery-1-to-1.bin` into one file per entry.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cipherface::io::{read_feature_file, GALLERY_FEATURES_FILE};
use cipherface::keys::FullKeySet;
use cipherface::params::presets;
use cipherface::enroll::TemplateEncryptor;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// N = 4096, 2048 slots per row
    Face,
    /// N = 16, for smoke tests only
    Compact,
}

#[derive(Parser)]
#[command(name = "cipherface-enroll")]
#[command(about = "Generate BFV keys and encrypt a face-template gallery")]
#[command(version)]
struct Args {
    /// Directory holding gallery-1-to-1.bin; keys and encrypted entries are written here
    #[arg(long)]
    data_dir: PathBuf,

    /// Parameter set
    #[arg(long, value_enum, default_value = "face")]
    preset: Preset,

    /// Quantization factor applied to every feature component
    #[arg(long, default_value = "125")]
    precision: f64,

    /// Random seed for deterministic keys and encryptions (optional)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let total_start = Instant::now();

    let context = match args.preset {
        Preset::Face => presets::face_matching(),
        Preset::Compact => presets::compact(),
    }
    .wrap_err("Failed to build encryption context")?;
    info!("{}", context.summary());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Generating keys...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let keygen_start = Instant::now();
    let keys = match args.seed {
        Some(seed) => FullKeySet::generate_with_rng(&context, &mut ChaCha20Rng::seed_from_u64(seed)),
        None => FullKeySet::generate(&context),
    }
    .wrap_err("Failed to generate keys")?;
    pb.finish_with_message("Keys generated");
    info!("Key generation time: {:.2?}", keygen_start.elapsed());

    fs::create_dir_all(&args.data_dir)
        .wrap_err_with(|| format!("Failed to create data directory: {}", args.data_dir.display()))?;
    keys.save_to_dir(&args.data_dir)
        .wrap_err_with(|| format!("Failed to save keys to {}", args.data_dir.display()))?;
    info!("Saved key files to {}", args.data_dir.display());

    let gallery_path = args.data_dir.join(GALLERY_FEATURES_FILE);
    let features = read_feature_file(&gallery_path)
        .wrap_err_with(|| format!("Failed to read gallery features: {}", gallery_path.display()))?;
    info!("Gallery: {} templates of dimension {}", features.count(), features.dim());

    let encryptor = TemplateEncryptor::new(&context, &keys.public_keys().public, args.precision)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Encrypting gallery...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let enroll_start = Instant::now();
    let gallery = match args.seed {
        Some(seed) => encryptor.enroll_with_seed(&features, seed.wrapping_add(1)),
        None => encryptor.enroll(&features),
    }
    .wrap_err("Failed to enroll gallery")?;
    pb.finish_with_message("Gallery encrypted");
    info!("Encryption time: {:.2?}", enroll_start.elapsed());

    let paths = gallery.save_to_dir(&args.data_dir)
        .wrap_err("Failed to save encrypted gallery")?;
    info!("Saved {} encrypted entries", paths.len());
    info!("Total time: {:.2?}", total_start.elapsed());

    Ok(())
}
