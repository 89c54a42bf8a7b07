use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pianoframe_dataset::IterOptions;
use serde::{Deserialize, Serialize};

use crate::streamer::ShortReadPolicy;

/// Pipeline settings shared by the command line tools.
///
/// Every key is optional in the YAML file; missing keys take the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding persisted datasets.
    pub store_root: PathBuf,
    pub session_field: String,
    pub keyboard_field: String,
    pub keypoints_field: String,
    /// Extension of the video files picked up at import.
    pub video_extension: String,
    pub max_hands: usize,
    pub short_read: ShortReadPolicy,
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("datasets"),
            session_field: "session".to_string(),
            keyboard_field: "keyboard".to_string(),
            keypoints_field: "hand_landmarker".to_string(),
            video_extension: "mp4".to_string(),
            max_hands: 2,
            short_read: ShortReadPolicy::Warn,
            progress_every: 10,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open config {}", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("parse config {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn iter_options(&self) -> IterOptions {
        IterOptions {
            progress: true,
            progress_every: self.progress_every,
            autosave: true,
        }
    }
}
