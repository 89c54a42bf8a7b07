use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pianoframe_domain::{BoxSet, KeypointSet, KeypointSkeleton, Label, VideoMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DatasetError;

/// Annotations attached to a single 1-based frame.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FrameRecord {
    pub frame_number: u32,
    #[serde(default)]
    pub fields: BTreeMap<String, Label>,
}

impl FrameRecord {
    pub fn new(frame_number: u32) -> Self {
        Self {
            frame_number,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Label> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, label: impl Into<Label>) {
        self.fields.insert(field.into(), label.into());
    }

    pub fn keypoints(&self, field: &str) -> Option<&KeypointSet> {
        self.get(field).and_then(Label::as_keypoints)
    }

    pub fn detections(&self, field: &str) -> Option<&BoxSet> {
        self.get(field).and_then(Label::as_detections)
    }
}

/// Frame records of one sample, ordered by frame number.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Frames {
    records: BTreeMap<u32, FrameRecord>,
}

impl Frames {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, frame_number: u32) -> Option<&FrameRecord> {
        self.records.get(&frame_number)
    }

    pub fn get_mut(&mut self, frame_number: u32) -> Option<&mut FrameRecord> {
        self.records.get_mut(&frame_number)
    }

    pub fn get_or_insert(&mut self, frame_number: u32) -> Result<&mut FrameRecord, DatasetError> {
        if frame_number == 0 {
            return Err(DatasetError::InvalidFrameNumber);
        }
        Ok(self
            .records
            .entry(frame_number)
            .or_insert_with(|| FrameRecord::new(frame_number)))
    }

    /// Makes sure records `1..=count` exist, leaving existing ones untouched.
    pub fn ensure(&mut self, count: u32) {
        for frame_number in 1..=count {
            self.records
                .entry(frame_number)
                .or_insert_with(|| FrameRecord::new(frame_number));
        }
    }

    pub fn last_frame_number(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FrameRecord> {
        self.records.values_mut()
    }
}

/// One video in a dataset with its scalar fields and frame records.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub id: String,
    pub filepath: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Option<VideoMetadata>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default)]
    pub frames: Frames,
}

impl Sample {
    pub fn new(id: impl Into<String>, filepath: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            filepath: filepath.into(),
            tags: Vec::new(),
            metadata: None,
            fields: BTreeMap::new(),
            frames: Frames::default(),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Result<&str, DatasetError> {
        self.get_field(name)
            .and_then(Value::as_str)
            .ok_or_else(|| DatasetError::MissingField {
                sample: self.describe(),
                field: name.to_string(),
            })
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn require_metadata(&self) -> Result<&VideoMetadata, DatasetError> {
        self.metadata
            .as_ref()
            .ok_or_else(|| DatasetError::MissingMetadata(self.describe()))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// File name with extension.
    pub fn filename(&self) -> String {
        file_component(&self.filepath, Path::file_name)
    }

    /// File name without extension.
    pub fn stem(&self) -> String {
        file_component(&self.filepath, Path::file_stem)
    }

    /// Identifier used in log and error messages.
    pub fn describe(&self) -> String {
        format!("{} ({})", self.id, self.filepath.display())
    }
}

fn file_component(path: &Path, component: fn(&Path) -> Option<&std::ffi::OsStr>) -> String {
    component(path)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Named, ordered collection of samples.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub name: String,
    #[serde(default)]
    pub default_skeleton: Option<KeypointSkeleton>,
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_skeleton: None,
            samples: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, filepath: impl Into<PathBuf>) -> &mut Sample {
        let id = format!("{:06}", self.samples.len() + 1);
        self.samples.push(Sample::new(id, filepath));
        let index = self.samples.len() - 1;
        &mut self.samples[index]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, id: &str) -> Option<&Sample> {
        self.samples.iter().find(|sample| sample.id == id)
    }
}
