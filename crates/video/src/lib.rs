pub mod backend;
pub mod detector;
pub mod error;
pub mod frame;
pub mod io;

pub use backend::{SyntheticBackend, SyntheticVideo};
pub use detector::{
    default_landmarker_factory, HandDetection, HandLandmarker, LandmarkerFactory,
    LandmarkerOptions, RunningMode, VideoLandmarker,
};
pub use error::{DetectorError, VideoError};
pub use frame::{Frame, PixelLayout, Region};
pub use io::{default_backend, StreamInfo, VideoBackend, VideoSource};
