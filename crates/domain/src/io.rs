use serde::{Deserialize, Serialize};

use crate::annotation::{KeypointSet, Point};
use crate::error::DomainError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    PrettyJson,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportedKeypoint {
    pub label: String,
    pub points: Vec<Point>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportedFrame {
    pub frame_number: u32,
    pub keypoints: Vec<ExportedKeypoint>,
}

/// Portable per-video keypoint document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub filename: String,
    pub frames: Vec<ExportedFrame>,
}

impl ExportDocument {
    /// Emits one entry for every frame in `1..=frame_count`; frames without a
    /// keypoint set get an empty list rather than being skipped.
    pub fn build<'a, F>(filename: impl Into<String>, frame_count: u32, mut keypoints_at: F) -> Self
    where
        F: FnMut(u32) -> Option<&'a KeypointSet>,
    {
        let frames = (1..=frame_count)
            .map(|frame_number| ExportedFrame {
                frame_number,
                keypoints: keypoints_at(frame_number)
                    .map(|set| {
                        set.keypoints
                            .iter()
                            .map(|kp| ExportedKeypoint {
                                label: kp.label.clone(),
                                points: kp.points.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            filename: filename.into(),
            frames,
        }
    }
}

pub trait DocumentExporter {
    fn export(&self, document: &ExportDocument, format: ExportFormat)
        -> Result<Vec<u8>, DomainError>;
}

pub struct JsonExporter;

impl DocumentExporter for JsonExporter {
    fn export(
        &self,
        document: &ExportDocument,
        format: ExportFormat,
    ) -> Result<Vec<u8>, DomainError> {
        let bytes = match format {
            ExportFormat::Json => serde_json::to_vec(document),
            ExportFormat::PrettyJson => serde_json::to_vec_pretty(document),
        };
        bytes.map_err(|err| DomainError::Serialization(err.to_string()))
    }
}
