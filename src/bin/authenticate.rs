//! cipherface-authenticate: score probes against an encrypted gallery
//!
//! Loads the key files and `--num-gallery` encrypted entries written by
//! `cipherface-enroll`, encrypts each probe from `probe-1-to-1.bin`, and
//! logs the decrypted similarity of every (probe, entry) pair.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cipherface::bfv::SecretKey;
use cipherface::enroll::{GalleryStore, TemplateEncryptor};
use cipherface::io::{read_feature_file, PROBE_FEATURES_FILE};
use cipherface::keys::PublicKeySet;
use cipherface::matching::MatchingEngine;
use cipherface::params::presets;
use cipherface::score::ScoreDecoder;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Face,
    Compact,
}

#[derive(Parser)]
#[command(name = "cipherface-authenticate")]
#[command(about = "Match encrypted probes against an encrypted face-template gallery")]
#[command(version)]
struct Args {
    /// Directory holding key files, encrypted entries and probe-1-to-1.bin
    #[arg(long)]
    data_dir: PathBuf,

    /// Number of encrypted gallery entries to load
    #[arg(long)]
    num_gallery: usize,

    /// Parameter set; must match the one used at enrollment
    #[arg(long, value_enum, default_value = "face")]
    preset: Preset,

    /// Quantization factor; must match the one used at enrollment
    #[arg(long, default_value = "125")]
    precision: f64,
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

    let public = PublicKeySet::load_from_dir(&context, &args.data_dir)
        .wrap_err_with(|| format!("Failed to load public keys from {}", args.data_dir.display()))?;
    let secret = SecretKey::load_from_dir(&context, &args.data_dir)
        .wrap_err_with(|| format!("Failed to load secret key from {}", args.data_dir.display()))?;

    let gallery = GalleryStore::load_from_dir(&context, &args.data_dir, args.num_gallery)
        .wrap_err("Failed to load encrypted gallery")?;
    info!("Loaded {} encrypted gallery entries", gallery.len());

    let probe_path = args.data_dir.join(PROBE_FEATURES_FILE);
    let features = read_feature_file(&probe_path)
        .wrap_err_with(|| format!("Failed to read probe features: {}", probe_path.display()))?;
    info!("Probes: {} templates of dimension {}", features.count(), features.dim());

    let encryptor = TemplateEncryptor::new(&context, &public.public, args.precision)?;
    let engine = MatchingEngine::new(&public).wrap_err("Public key set cannot drive matching")?;
    let decoder = ScoreDecoder::new(&secret, args.precision)?;

    let pb = ProgressBar::new(features.count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let match_start = Instant::now();
    for (p, probe) in features.rows().enumerate() {
        let encrypted = encryptor.encrypt(probe)
            .wrap_err_with(|| format!("Failed to encrypt probe {p}"))?;
        let scores = engine.match_gallery(p, &encrypted, &gallery)
            .wrap_err_with(|| format!("Failed to match probe {p}"))?;
        for result in decoder.decode_all(&scores)? {
            pb.suspend(|| info!("probe {} vs gallery {}: score {:.6}", result.probe, result.gallery, result.score));
        }
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    info!("Matching time: {:.2?}", match_start.elapsed());
    info!("Total time: {:.2?}", total_start.elapsed());

    Ok(())
}
