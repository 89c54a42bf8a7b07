pub mod annotation;
pub mod error;
pub mod geometry;
pub mod io;
pub mod keyboard;
pub mod metadata;
pub mod session;
pub mod skeleton;

pub use crate::annotation::{BoxSet, Detection, Keypoint, KeypointSet, Label, Point};
pub use crate::error::DomainError;
pub use crate::geometry::{PixelBox, RelativeBox};
pub use crate::io::{DocumentExporter, ExportDocument, ExportFormat, JsonExporter};
pub use crate::keyboard::{keyboard_box_set, match_session, BoxPrediction, KeyboardBoxEntry};
pub use crate::metadata::VideoMetadata;
pub use crate::session::{sort_by_session_key, SessionId, SessionKey, VideoAsset};
pub use crate::skeleton::KeypointSkeleton;
