use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pianoframe_annotator::{run_hand_landmarker, LandmarkerRun, PipelineConfig};
use pianoframe_dataset::JsonStore;
use pianoframe_video::{default_backend, default_landmarker_factory};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the hand landmarker over every frame of a stored dataset"
)]
struct Args {
    #[arg(long, default_value = "rach3")]
    dataset_name: String,
    /// Hand landmark model file
    #[arg(long)]
    model_asset_path: PathBuf,
    /// Frame field receiving the keypoints; defaults to the configured field
    #[arg(long)]
    keypoints_field: Option<String>,
    /// Number of randomly chosen samples, -1 for all
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    num_samples: i64,
    #[arg(long, default_value = "0x5EED", value_parser = parse_seed)]
    seed: u64,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    store: Option<PathBuf>,
}

fn parse_seed(value: &str) -> Result<u64, std::num::ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(store) = args.store {
        config.store_root = store;
    }
    let store = JsonStore::open(&config.store_root)?;
    let backend = default_backend()?;
    let factory = default_landmarker_factory()?;

    let request = LandmarkerRun {
        dataset_name: args.dataset_name,
        model_asset_path: args.model_asset_path,
        keypoints_field: args
            .keypoints_field
            .unwrap_or_else(|| config.keypoints_field.clone()),
        num_samples: args.num_samples,
        seed: args.seed,
    };
    let summary = run_hand_landmarker(&store, backend.as_ref(), factory.as_ref(), &config, &request)?;
    println!(
        "Annotated {} frames in {} samples ({} ended early)",
        summary.frames, summary.samples, summary.short_reads
    );
    Ok(())
}
