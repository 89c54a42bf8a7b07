use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotation::{BoxSet, Detection};
use crate::geometry::PixelBox;
use crate::DomainError;

/// One raw keyboard prediction in pixel space.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BoxPrediction {
    #[serde(rename = "box")]
    pub corners: PixelBox,
    pub name: String,
    #[serde(rename = "class")]
    pub class_id: i64,
    pub confidence: f64,
}

impl BoxPrediction {
    pub fn to_detection(&self, frame_width: u32, frame_height: u32) -> Detection {
        Detection {
            label: self.name.clone(),
            class_id: self.class_id,
            confidence: self.confidence,
            bounding_box: self.corners.normalize(frame_width, frame_height),
        }
    }
}

/// Keyboard predictions for one recording session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KeyboardBoxEntry {
    pub session_id: String,
    #[serde(rename = "box")]
    pub boxes: Vec<BoxPrediction>,
}

pub fn load_keyboard_boxes<P: AsRef<Path>>(path: P) -> Result<Vec<KeyboardBoxEntry>, DomainError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        DomainError::Serialization(format!("open keyboard boxes {}: {err}", path.display()))
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| {
        DomainError::Serialization(format!("parse keyboard boxes {}: {err}", path.display()))
    })
}

/// Returns the box list of the single entry tagged with `session_id`.
///
/// Zero or several matching entries are an error; the first match is never
/// picked silently.
pub fn match_session<'a>(
    session_id: &str,
    entries: &'a [KeyboardBoxEntry],
) -> Result<&'a [BoxPrediction], DomainError> {
    let matching: Vec<&KeyboardBoxEntry> = entries
        .iter()
        .filter(|entry| entry.session_id == session_id)
        .collect();
    match matching[..] {
        [entry] => Ok(entry.boxes.as_slice()),
        _ => Err(DomainError::SessionMatch {
            session_id: session_id.to_string(),
            matches: matching.len(),
        }),
    }
}

/// Matches the session and normalizes its boxes against the frame size.
pub fn keyboard_box_set(
    session_id: &str,
    entries: &[KeyboardBoxEntry],
    frame_width: u32,
    frame_height: u32,
) -> Result<BoxSet, DomainError> {
    let predictions = match_session(session_id, entries)?;
    Ok(BoxSet::new(
        predictions
            .iter()
            .map(|prediction| prediction.to_detection(frame_width, frame_height))
            .collect(),
    ))
}
