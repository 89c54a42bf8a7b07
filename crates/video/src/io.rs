use std::path::Path;

use pianoframe_domain::VideoMetadata;

use crate::frame::Frame;
use crate::VideoError;

/// Container-declared stream properties, read when a video is opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// May overstate the number of frames that actually decode.
    pub declared_frame_count: u32,
    pub frame_rate: f64,
}

impl StreamInfo {
    pub fn metadata(&self) -> VideoMetadata {
        VideoMetadata {
            frame_width: self.width,
            frame_height: self.height,
            total_frame_count: self.declared_frame_count,
            frame_rate: self.frame_rate,
        }
    }
}

/// Sequential decode handle for one video. Dropping it releases the decoder.
pub trait VideoSource {
    fn info(&self) -> StreamInfo;

    /// Decodes the next frame; `None` once the stream cannot produce more.
    fn read_frame(&mut self) -> Option<Frame>;
}

pub trait VideoBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError>;

    fn probe(&self, path: &Path) -> Result<VideoMetadata, VideoError> {
        Ok(self.open(path)?.info().metadata())
    }
}

/// The decoder compiled into this build.
pub fn default_backend() -> Result<Box<dyn VideoBackend>, VideoError> {
    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(opencv_backend::OpenCvBackend))
    }
    #[cfg(not(feature = "opencv"))]
    {
        Err(VideoError::Unsupported(
            "no video decoder compiled in; rebuild with the `opencv` feature".to_string(),
        ))
    }
}

#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvBackend;

#[cfg(feature = "opencv")]
mod opencv_backend {
    use std::path::Path;

    use opencv::core::Mat;
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture};
    use tracing::{debug, warn};

    use super::{StreamInfo, VideoBackend, VideoSource};
    use crate::frame::{Frame, PixelLayout};
    use crate::VideoError;

    pub struct OpenCvBackend;

    impl VideoBackend for OpenCvBackend {
        fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, VideoError> {
            let open_error = |reason: String| VideoError::Open {
                path: path.to_path_buf(),
                reason,
            };
            let source = path
                .to_str()
                .ok_or_else(|| open_error("path is not valid UTF-8".to_string()))?;
            let capture = VideoCapture::from_file(source, videoio::CAP_ANY)
                .map_err(|err| open_error(err.to_string()))?;
            if !capture.is_opened().map_err(|err| open_error(err.to_string()))? {
                return Err(open_error("capture did not open".to_string()));
            }
            let property = |id: i32| {
                capture
                    .get(id)
                    .map_err(|err| VideoError::Backend(err.to_string()))
            };
            let info = StreamInfo {
                width: property(videoio::CAP_PROP_FRAME_WIDTH)?.max(0.0) as u32,
                height: property(videoio::CAP_PROP_FRAME_HEIGHT)?.max(0.0) as u32,
                declared_frame_count: property(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u32,
                frame_rate: property(videoio::CAP_PROP_FPS)?,
            };
            debug!(path = %path.display(), ?info, "opened video");
            Ok(Box::new(OpenCvSource {
                capture,
                info,
                buffer: Mat::default(),
            }))
        }
    }

    struct OpenCvSource {
        capture: VideoCapture,
        info: StreamInfo,
        buffer: Mat,
    }

    impl VideoSource for OpenCvSource {
        fn info(&self) -> StreamInfo {
            self.info
        }

        fn read_frame(&mut self) -> Option<Frame> {
            match self.capture.read(&mut self.buffer) {
                Ok(true) if !self.buffer.empty() => {}
                Ok(_) => return None,
                Err(err) => {
                    debug!(%err, "frame decode failed");
                    return None;
                }
            }
            let width = self.buffer.cols().max(0) as u32;
            let height = self.buffer.rows().max(0) as u32;
            let bytes = match self.buffer.data_bytes() {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    warn!(%err, "decoded frame is not contiguous");
                    return None;
                }
            };
            match Frame::new(width, height, PixelLayout::Bgr, bytes) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    warn!(%err, "unexpected decoded frame layout");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_info_maps_to_metadata() {
        let info = StreamInfo {
            width: 640,
            height: 480,
            declared_frame_count: 90,
            frame_rate: 30.0,
        };
        let metadata = info.metadata();
        assert_eq!(metadata.frame_width, 640);
        assert_eq!(metadata.total_frame_count, 90);
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn default_backend_reports_missing_decoder() {
        assert!(matches!(default_backend(), Err(VideoError::Unsupported(_))));
    }
}
