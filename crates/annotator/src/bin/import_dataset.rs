use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pianoframe_annotator::{DatasetImporter, ImportOutcome, PipelineConfig};
use pianoframe_dataset::JsonStore;
use pianoframe_video::default_backend;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Create a dataset from piano videos and attach keyboard bounding boxes"
)]
struct Args {
    #[arg(long, default_value = "rach3")]
    dataset_name: String,
    /// Directory searched recursively for videos
    #[arg(long, default_value = ".")]
    dataset_dir: PathBuf,
    /// Keyboard box predictions, relative to the dataset directory
    #[arg(long, default_value = "rach3_bounding_boxes.json")]
    keyboard_bboxes: PathBuf,
    /// Delete an existing dataset with the same name first
    #[arg(long)]
    overwrite: bool,
    /// YAML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dataset store directory, overriding the configuration
    #[arg(long)]
    store: Option<PathBuf>,
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

    let importer = DatasetImporter::new(&store, backend.as_ref(), &config);
    match importer.import(
        &args.dataset_name,
        &args.dataset_dir,
        &args.keyboard_bboxes,
        args.overwrite,
    )? {
        ImportOutcome::Created { samples } => {
            info!(samples, "import finished");
            println!("Created dataset '{}' with {} samples", args.dataset_name, samples);
        }
        ImportOutcome::AlreadyExists => {
            println!("Dataset {} already exists", args.dataset_name);
        }
    }
    Ok(())
}
