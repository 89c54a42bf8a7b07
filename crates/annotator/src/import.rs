use std::path::Path;

use anyhow::{Context, Result};
use pianoframe_dataset::{find_files, for_each_sample, Dataset, DatasetStore, Sample};
use pianoframe_domain::keyboard::load_keyboard_boxes;
use pianoframe_domain::{
    keyboard_box_set, match_session, sort_by_session_key, KeyboardBoxEntry, SessionId, VideoAsset,
};
use pianoframe_video::VideoBackend;
use tracing::{info, instrument};

use crate::config::PipelineConfig;

const TRAIN_TAG: &str = "train";
const TEST_TAG: &str = "test";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    Created { samples: usize },
    AlreadyExists,
}

/// Builds a dataset from a directory of recordings and attaches keyboard boxes.
pub struct DatasetImporter<'a> {
    store: &'a dyn DatasetStore,
    backend: &'a dyn VideoBackend,
    config: &'a PipelineConfig,
}

impl<'a> DatasetImporter<'a> {
    pub fn new(
        store: &'a dyn DatasetStore,
        backend: &'a dyn VideoBackend,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
        }
    }

    /// Full import: optional overwrite, creation, session field, keyboard boxes.
    ///
    /// `bbox_file` is resolved relative to `dataset_dir`. Recording names and
    /// session matches are checked before the dataset is persisted, so a
    /// failed import leaves no dataset behind.
    #[instrument(skip(self))]
    pub fn import(
        &self,
        name: &str,
        dataset_dir: &Path,
        bbox_file: &Path,
        overwrite: bool,
    ) -> Result<ImportOutcome> {
        if overwrite && self.store.exists(name)? {
            info!(name, "overwriting dataset");
            self.store.delete(name)?;
        }
        if self.store.exists(name)? {
            info!(name, "dataset already exists");
            return Ok(ImportOutcome::AlreadyExists);
        }

        let bbox_path = dataset_dir.join(bbox_file);
        let entries = load_keyboard_boxes(&bbox_path)
            .with_context(|| format!("load keyboard boxes from {}", bbox_path.display()))?;

        let assets = self.collect_assets(dataset_dir, &entries)?;

        info!(name, dir = %dataset_dir.display(), "creating dataset");
        let mut dataset = self.create_dataset(name, &assets)?;
        self.add_session_field(&mut dataset)?;
        info!(name, "adding keyboard bounding boxes");
        self.add_keyboard_boxes(&mut dataset, &entries)?;
        Ok(ImportOutcome::Created {
            samples: dataset.len(),
        })
    }

    /// Finds the recordings under `dataset_dir` in session-key order and checks
    /// that each session has exactly one keyboard box entry.
    pub fn collect_assets(
        &self,
        dataset_dir: &Path,
        entries: &[KeyboardBoxEntry],
    ) -> Result<Vec<VideoAsset>> {
        let files = find_files(dataset_dir, &self.config.video_extension)?;
        let assets = sort_by_session_key(files).context("order recordings by session key")?;
        for asset in &assets {
            match_session(asset.session.as_str(), entries)
                .with_context(|| format!("keyboard boxes for {}", asset.path.display()))?;
        }
        Ok(assets)
    }

    /// Registers the assets in order, tags each by split and records its
    /// stream metadata, then persists the dataset.
    pub fn create_dataset(&self, name: &str, assets: &[VideoAsset]) -> Result<Dataset> {
        let mut dataset = Dataset::new(name);
        for asset in assets {
            dataset.add_sample(asset.path.clone());
        }
        info!(name, samples = dataset.len(), "adding samples to dataset");

        for sample in &mut dataset.samples {
            let tag = split_tag(sample);
            sample.tags.push(tag.to_string());
            let metadata = self
                .backend
                .probe(&sample.filepath)
                .with_context(|| format!("read metadata of {}", sample.filepath.display()))?;
            sample.metadata = Some(metadata);
        }
        self.store.create(&dataset)?;
        Ok(dataset)
    }

    /// Stores the session id derived from each sample's path.
    pub fn add_session_field(&self, dataset: &mut Dataset) -> Result<()> {
        let field = self.config.session_field.as_str();
        for_each_sample(
            self.store,
            dataset,
            None,
            self.config.iter_options(),
            |sample| -> Result<()> {
                let session = SessionId::from_path(&sample.filepath)?;
                sample.set_field(field, session.as_str());
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Attaches the session's keyboard boxes, normalized to the frame size, to
    /// every declared frame of each sample.
    pub fn add_keyboard_boxes(&self, dataset: &mut Dataset, entries: &[KeyboardBoxEntry]) -> Result<()> {
        let session_field = self.config.session_field.as_str();
        let keyboard_field = self.config.keyboard_field.as_str();
        for_each_sample(
            self.store,
            dataset,
            None,
            self.config.iter_options(),
            |sample| -> Result<()> {
                let session = sample.get_str(session_field)?.to_string();
                let metadata = *sample.require_metadata()?;
                let boxes = keyboard_box_set(
                    &session,
                    entries,
                    metadata.frame_width,
                    metadata.frame_height,
                )
                .with_context(|| format!("keyboard boxes for {}", sample.filepath.display()))?;
                sample.frames.ensure(metadata.total_frame_count);
                for frame in sample.frames.iter_mut() {
                    frame.set(keyboard_field, boxes.clone());
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

fn split_tag(sample: &Sample) -> &'static str {
    if sample.filepath.to_string_lossy().contains(TRAIN_TAG) {
        TRAIN_TAG
    } else {
        TEST_TAG
    }
}
