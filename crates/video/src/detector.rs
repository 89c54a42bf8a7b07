use std::path::PathBuf;

use pianoframe_domain::{Keypoint, Point};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame::Frame;
use crate::DetectorError;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunningMode {
    Image,
    #[default]
    Video,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LandmarkerOptions {
    pub model_asset_path: PathBuf,
    pub running_mode: RunningMode,
    pub max_hands: usize,
    /// Minimum hand presence score for a detection to be reported.
    pub min_presence: f32,
}

impl LandmarkerOptions {
    pub fn video(model_asset_path: impl Into<PathBuf>, max_hands: usize) -> Self {
        Self {
            model_asset_path: model_asset_path.into(),
            running_mode: RunningMode::Video,
            max_hands,
            min_presence: 0.5,
        }
    }

    /// Checks that the model asset exists and the options are usable.
    pub fn validate(&self) -> Result<(), DetectorError> {
        if !self.model_asset_path.is_file() {
            return Err(DetectorError::Init(format!(
                "model asset {} does not exist",
                self.model_asset_path.display()
            )));
        }
        if self.max_hands == 0 {
            return Err(DetectorError::Init("max_hands must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// One detected hand: handedness label plus landmarks in unit-square coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct HandDetection {
    pub handedness: String,
    pub score: f32,
    pub points: Vec<Point>,
}

impl From<HandDetection> for Keypoint {
    fn from(detection: HandDetection) -> Self {
        Keypoint::new(detection.handedness, detection.points)
    }
}

/// Stateful hand landmark engine bound to one video.
pub trait HandLandmarker {
    fn detect(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<HandDetection>, DetectorError>;
}

pub trait LandmarkerFactory: Send + Sync {
    fn create(&self, options: &LandmarkerOptions) -> Result<Box<dyn HandLandmarker>, DetectorError>;
}

/// Per-video landmarker handle.
///
/// Rejects timestamps that do not strictly increase; the underlying engine is
/// released when the handle is dropped.
pub struct VideoLandmarker {
    inner: Box<dyn HandLandmarker>,
    last_timestamp: Option<u64>,
}

impl VideoLandmarker {
    pub fn open(
        factory: &dyn LandmarkerFactory,
        options: &LandmarkerOptions,
    ) -> Result<Self, DetectorError> {
        if options.running_mode != RunningMode::Video {
            return Err(DetectorError::Init(
                "per-video landmarkers require the video running mode".to_string(),
            ));
        }
        debug!(max_hands = options.max_hands, "opening per-video landmarker");
        Ok(Self {
            inner: factory.create(options)?,
            last_timestamp: None,
        })
    }

    pub fn detect(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<HandDetection>, DetectorError> {
        if let Some(previous) = self.last_timestamp {
            if timestamp_ms <= previous {
                return Err(DetectorError::NonMonotonicTimestamp {
                    previous,
                    current: timestamp_ms,
                });
            }
        }
        self.last_timestamp = Some(timestamp_ms);
        self.inner.detect(frame, timestamp_ms)
    }
}

/// The landmark engine compiled into this build.
pub fn default_landmarker_factory() -> Result<Box<dyn LandmarkerFactory>, DetectorError> {
    #[cfg(feature = "onnx")]
    {
        Ok(Box::new(onnx::OnnxLandmarkerFactory::new()?))
    }
    #[cfg(not(feature = "onnx"))]
    {
        Err(DetectorError::Init(
            "no hand landmark engine compiled in; rebuild with the `onnx` feature".to_string(),
        ))
    }
}

pub fn handedness_label(right_probability: f32) -> &'static str {
    if right_probability >= 0.5 {
        "Right"
    } else {
        "Left"
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxLandmarkerFactory;

#[cfg(feature = "onnx")]
mod onnx {
    use std::sync::Arc;

    use ndarray::{CowArray, IxDyn};
    use ort::tensor::OrtOwnedTensor;
    use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
    use tracing::info;

    use super::{handedness_label, HandDetection, HandLandmarker, LandmarkerFactory, LandmarkerOptions};
    use crate::frame::{region_tensor, Frame, Region};
    use crate::DetectorError;

    const INPUT_SIZE: usize = 224;
    const LANDMARK_COUNT: usize = 21;

    /// Builds landmarkers from a single-hand landmark ONNX model.
    ///
    /// The model takes a `[1, 224, 224, 3]` RGB tensor and returns landmarks
    /// (`[1, 63]`, input pixels), hand presence (`[1, 1]`) and right-hand
    /// probability (`[1, 1]`). Each of `max_hands` equal vertical bands of the
    /// frame is searched for one hand.
    pub struct OnnxLandmarkerFactory {
        environment: Arc<Environment>,
    }

    impl OnnxLandmarkerFactory {
        pub fn new() -> Result<Self, DetectorError> {
            let environment = Environment::builder()
                .with_name("pianoframe")
                .build()
                .map_err(|err| DetectorError::Init(err.to_string()))?
                .into_arc();
            Ok(Self { environment })
        }
    }

    impl LandmarkerFactory for OnnxLandmarkerFactory {
        fn create(&self, options: &LandmarkerOptions) -> Result<Box<dyn HandLandmarker>, DetectorError> {
            options.validate()?;
            let session = SessionBuilder::new(&self.environment)
                .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level1))
                .and_then(|builder| builder.with_model_from_file(&options.model_asset_path))
                .map_err(|err| DetectorError::Init(err.to_string()))?;
            info!(model = %options.model_asset_path.display(), max_hands = options.max_hands, "loaded hand landmark model");
            Ok(Box::new(OnnxHandLandmarker {
                session,
                max_hands: options.max_hands,
                min_presence: options.min_presence,
            }))
        }
    }

    struct OnnxHandLandmarker {
        session: Session,
        max_hands: usize,
        min_presence: f32,
    }

    impl OnnxHandLandmarker {
        fn detect_region(&self, frame: &Frame, region: Region) -> Result<Option<HandDetection>, DetectorError> {
            let inference = |err: ort::OrtError| DetectorError::Inference(err.to_string());
            let tensor = region_tensor(frame, region, INPUT_SIZE)
                .map_err(|err| DetectorError::Inference(err.to_string()))?;
            let input = CowArray::from(tensor.into_dyn());
            let inputs = vec![Value::from_array(self.session.allocator(), &input).map_err(inference)?];
            let outputs: Vec<Value> = self.session.run(inputs).map_err(inference)?;
            if outputs.len() < 3 {
                return Err(DetectorError::Inference(format!(
                    "expected 3 model outputs, got {}",
                    outputs.len()
                )));
            }
            let landmarks: OrtOwnedTensor<f32, IxDyn> = outputs[0].try_extract().map_err(inference)?;
            let presence: OrtOwnedTensor<f32, IxDyn> = outputs[1].try_extract().map_err(inference)?;
            let handedness: OrtOwnedTensor<f32, IxDyn> = outputs[2].try_extract().map_err(inference)?;

            let score = presence.view().iter().copied().next().unwrap_or(0.0);
            if score < self.min_presence {
                return Ok(None);
            }
            let right = handedness.view().iter().copied().next().unwrap_or(0.0);
            let values: Vec<f32> = landmarks.view().iter().copied().collect();
            if values.len() < LANDMARK_COUNT * 3 {
                return Err(DetectorError::Inference(format!(
                    "expected {} landmark values, got {}",
                    LANDMARK_COUNT * 3,
                    values.len()
                )));
            }
            let frame_width = f64::from(frame.width);
            let points = values
                .chunks_exact(3)
                .take(LANDMARK_COUNT)
                .map(|xyz| {
                    let local_x = f64::from(xyz[0]) / INPUT_SIZE as f64;
                    let local_y = f64::from(xyz[1]) / INPUT_SIZE as f64;
                    let x = (f64::from(region.x0) + local_x * f64::from(region.width())) / frame_width;
                    (x, local_y)
                })
                .collect();
            Ok(Some(HandDetection {
                handedness: handedness_label(right).to_string(),
                score,
                points,
            }))
        }
    }

    impl HandLandmarker for OnnxHandLandmarker {
        fn detect(&mut self, frame: &Frame, _timestamp_ms: u64) -> Result<Vec<HandDetection>, DetectorError> {
            let mut hands = Vec::new();
            for region in Region::split(frame.width, self.max_hands) {
                if let Some(hand) = self.detect_region(frame, region)? {
                    hands.push(hand);
                }
            }
            Ok(hands)
        }
    }
}
