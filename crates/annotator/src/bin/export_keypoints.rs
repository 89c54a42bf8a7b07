use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pianoframe_annotator::{AnnotationExporter, PipelineConfig};
use pianoframe_dataset::{DatasetStore, JsonStore};
use pianoframe_domain::ExportFormat;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Export per-frame hand keypoints to one JSON file per video"
)]
struct Args {
    export_dir: PathBuf,
    dataset_name: String,
    /// Frame field holding the keypoints
    field: String,
    /// Indent the written JSON
    #[arg(long)]
    pretty: bool,
    #[arg(long)]
    config: Option<PathBuf>,
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
    let dataset = store
        .load(&args.dataset_name)
        .with_context(|| format!("load dataset '{}'", args.dataset_name))?;

    let format = if args.pretty {
        ExportFormat::PrettyJson
    } else {
        ExportFormat::Json
    };
    let exporter = AnnotationExporter::new(&args.export_dir, args.field).with_format(format);
    let written = exporter.export_dataset(&dataset)?;
    println!("Wrote {} files to {}", written.len(), args.export_dir.display());
    Ok(())
}
