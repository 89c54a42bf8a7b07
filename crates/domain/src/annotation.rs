use serde::{Deserialize, Serialize};

use crate::geometry::RelativeBox;

/// A point in unit-square coordinates, origin top-left.
pub type Point = (f64, f64);

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub label: String,
    #[serde(rename = "class")]
    pub class_id: i64,
    pub confidence: f64,
    pub bounding_box: RelativeBox,
}

/// Ordered detections attached to one frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BoxSet {
    pub detections: Vec<Detection>,
}

impl BoxSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Keypoint {
    pub label: String,
    pub points: Vec<Point>,
}

impl Keypoint {
    /// Points are expected in unit-square coordinates already and are stored as given.
    pub fn new(label: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// Ordered labeled point lists attached to one frame.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KeypointSet {
    pub keypoints: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// A frame-level annotation field value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Label {
    Detections(BoxSet),
    Keypoints(KeypointSet),
}

impl Label {
    pub fn as_detections(&self) -> Option<&BoxSet> {
        match self {
            Label::Detections(boxes) => Some(boxes),
            Label::Keypoints(_) => None,
        }
    }

    pub fn as_keypoints(&self) -> Option<&KeypointSet> {
        match self {
            Label::Keypoints(keypoints) => Some(keypoints),
            Label::Detections(_) => None,
        }
    }
}

impl From<BoxSet> for Label {
    fn from(value: BoxSet) -> Self {
        Label::Detections(value)
    }
}

impl From<KeypointSet> for Label {
    fn from(value: KeypointSet) -> Self {
        Label::Keypoints(value)
    }
}
