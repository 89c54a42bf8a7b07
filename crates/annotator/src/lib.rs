//! Frame-synchronized keyboard and hand annotation for piano performance videos.

pub mod config;
pub mod export;
pub mod import;
pub mod streamer;

pub use config::PipelineConfig;
pub use export::AnnotationExporter;
pub use import::{DatasetImporter, ImportOutcome};
pub use streamer::{
    run_hand_landmarker, FrameAnnotationStreamer, FrameClock, LandmarkerRun, ShortReadPolicy,
    StreamError, StreamOutcome, StreamSummary,
};
