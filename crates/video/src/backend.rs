use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::frame::{Frame, PixelLayout};
use crate::io::{StreamInfo, VideoBackend, VideoSource};
use crate::VideoError;

/// Generated video with a declared frame count that may exceed what decodes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticVideo {
    pub info: StreamInfo,
    pub decodable_frames: u32,
}

impl SyntheticVideo {
    pub fn new(width: u32, height: u32, frame_count: u32, frame_rate: f64) -> Self {
        Self {
            info: StreamInfo {
                width,
                height,
                declared_frame_count: frame_count,
                frame_rate,
            },
            decodable_frames: frame_count,
        }
    }

    pub fn truncated_at(mut self, decodable_frames: u32) -> Self {
        self.decodable_frames = decodable_frames;
        self
    }
}

/// In-process backend serving generated BGR frames for registered paths.
///
/// Frame `n` (1-based) is filled with `[n % 256, 0, 255]` in BGR order.
#[derive(Default)]
pub struct SyntheticBackend {
    videos: HashMap<PathBuf, SyntheticVideo>,
    opened: Arc<AtomicUsize>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>, video: SyntheticVideo) -> Self {
        self.videos.insert(path.into(), video);
        self
    }

    /// Number of decode handles handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl VideoBackend for SyntheticBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError> {
        let video = self.videos.get(path).copied().ok_or_else(|| VideoError::Open {
            path: path.to_path_buf(),
            reason: "no synthetic video registered".to_string(),
        })?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(path = %path.display(), ?video, "opening synthetic video");
        Ok(Box::new(SyntheticSource { video, produced: 0 }))
    }
}

struct SyntheticSource {
    video: SyntheticVideo,
    produced: u32,
}

impl VideoSource for SyntheticSource {
    fn info(&self) -> StreamInfo {
        self.video.info
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if self.produced >= self.video.decodable_frames {
            return None;
        }
        self.produced += 1;
        let marker = (self.produced % 256) as u8;
        Some(Frame::filled(
            self.video.info.width,
            self.video.info.height,
            PixelLayout::Bgr,
            [marker, 0, 255],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_decodable_frames() {
        let backend = SyntheticBackend::new().with_video(
            "clip.mp4",
            SyntheticVideo::new(4, 4, 10, 30.0).truncated_at(2),
        );
        let mut source = backend.open(Path::new("clip.mp4")).unwrap();
        assert_eq!(source.info().declared_frame_count, 10);
        assert_eq!(source.read_frame().unwrap().data[0], 1);
        assert_eq!(source.read_frame().unwrap().data[0], 2);
        assert!(source.read_frame().is_none());
        assert_eq!(backend.opened(), 1);
    }

    #[test]
    fn probe_reports_declared_metadata() {
        let backend =
            SyntheticBackend::new().with_video("clip.mp4", SyntheticVideo::new(640, 480, 90, 25.0));
        let metadata = backend.probe(Path::new("clip.mp4")).unwrap();
        assert_eq!(metadata.frame_height, 480);
        assert_eq!(metadata.total_frame_count, 90);
        assert!(backend.open(Path::new("missing.mp4")).is_err());
    }
}
