use serde::{Deserialize, Serialize};

/// Container-level facts about a video, as declared by its metadata.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoMetadata {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Declared frame count; decoding may yield fewer.
    pub total_frame_count: u32,
    pub frame_rate: f64,
}
