use serde::{Deserialize, Serialize};

/// Landmark names produced by 21-point hand landmark models, in index order.
pub const HAND_LANDMARKS: [&str; 21] = [
    "WRIST",
    "THUMB_CMC",
    "THUMB_MCP",
    "THUMB_IP",
    "THUMB_TIP",
    "INDEX_FINGER_MCP",
    "INDEX_FINGER_PIP",
    "INDEX_FINGER_DIP",
    "INDEX_FINGER_TIP",
    "MIDDLE_FINGER_MCP",
    "MIDDLE_FINGER_PIP",
    "MIDDLE_FINGER_DIP",
    "MIDDLE_FINGER_TIP",
    "RING_FINGER_MCP",
    "RING_FINGER_PIP",
    "RING_FINGER_DIP",
    "RING_FINGER_TIP",
    "PINKY_MCP",
    "PINKY_PIP",
    "PINKY_DIP",
    "PINKY_TIP",
];

pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // palm
    (0, 1),
    (0, 5),
    (9, 13),
    (13, 17),
    (5, 9),
    (0, 17),
    // thumb
    (1, 2),
    (2, 3),
    (3, 4),
    // index
    (5, 6),
    (6, 7),
    (7, 8),
    // middle
    (9, 10),
    (10, 11),
    (11, 12),
    // ring
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky
    (17, 18),
    (18, 19),
    (19, 20),
];

/// Point names and edges used to draw keypoint annotations.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeypointSkeleton {
    pub labels: Vec<String>,
    pub edges: Vec<(usize, usize)>,
}

impl KeypointSkeleton {
    pub fn hand() -> Self {
        Self {
            labels: HAND_LANDMARKS.iter().map(|name| name.to_string()).collect(),
            edges: HAND_CONNECTIONS.to_vec(),
        }
    }
}
