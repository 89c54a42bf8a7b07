use std::path::PathBuf;

use anyhow::Context;
use pianoframe_dataset::{for_each_sample, take, Dataset, DatasetError, DatasetStore, IterOptions, Sample};
use pianoframe_domain::{Keypoint, KeypointSet, KeypointSkeleton};
use pianoframe_video::{
    DetectorError, LandmarkerFactory, LandmarkerOptions, VideoBackend, VideoError, VideoLandmarker,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;

/// How a video that decodes fewer frames than it declares is reported.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShortReadPolicy {
    /// Log a warning with the number of missing frames.
    #[default]
    Warn,
    /// Only log at debug level.
    Silent,
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Video(#[from] VideoError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("sample {sample} reports unusable frame rate {frame_rate}")]
    InvalidFrameRate { sample: String, frame_rate: f64 },
}

/// Millisecond timestamps for 1-based frame numbers at a fixed frame rate.
///
/// Frame 1 is at 0 ms. Rounded values never repeat: a frame whose rounded
/// timestamp would not exceed the previous one is moved to previous + 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameClock {
    frame_ms: f64,
    last: Option<u64>,
}

impl FrameClock {
    pub fn new(frame_rate: f64) -> Option<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return None;
        }
        Some(Self {
            frame_ms: 1000.0 / frame_rate,
            last: None,
        })
    }

    pub fn timestamp_ms(&mut self, frame_number: u32) -> u64 {
        let offset = f64::from(frame_number.saturating_sub(1));
        let rounded = (self.frame_ms * offset).round() as u64;
        let timestamp = match self.last {
            Some(previous) if rounded <= previous => previous + 1,
            _ => rounded,
        };
        self.last = Some(timestamp);
        timestamp
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    Complete { frames: u32 },
    /// The decoder ran dry before the declared count; later frames are untouched.
    ShortRead { declared: u32, decoded: u32 },
}

impl StreamOutcome {
    pub fn annotated_frames(&self) -> u32 {
        match *self {
            StreamOutcome::Complete { frames } => frames,
            StreamOutcome::ShortRead { decoded, .. } => decoded,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub samples: usize,
    pub complete: usize,
    pub short_reads: usize,
    pub frames: u64,
}

impl StreamSummary {
    fn record(&mut self, outcome: StreamOutcome) {
        self.samples += 1;
        match outcome {
            StreamOutcome::Complete { .. } => self.complete += 1,
            StreamOutcome::ShortRead { .. } => self.short_reads += 1,
        }
        self.frames += u64::from(outcome.annotated_frames());
    }
}

/// Runs a per-video hand landmarker over every decodable frame of a sample and
/// stores the detections as a keypoint set on the matching frame record.
pub struct FrameAnnotationStreamer<'a> {
    backend: &'a dyn VideoBackend,
    factory: &'a dyn LandmarkerFactory,
    options: LandmarkerOptions,
    field: String,
    short_read: ShortReadPolicy,
}

impl<'a> FrameAnnotationStreamer<'a> {
    pub fn new(
        backend: &'a dyn VideoBackend,
        factory: &'a dyn LandmarkerFactory,
        options: LandmarkerOptions,
        field: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            factory,
            options,
            field: field.into(),
            short_read: ShortReadPolicy::default(),
        }
    }

    pub fn with_short_read_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.short_read = policy;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Streams one video. The decoder and landmarker live for this call only.
    #[instrument(skip(self, sample), fields(sample = %sample.id))]
    pub fn annotate_sample(&self, sample: &mut Sample) -> Result<StreamOutcome, StreamError> {
        let mut source = self.backend.open(&sample.filepath)?;
        let info = source.info();
        let mut clock =
            FrameClock::new(info.frame_rate).ok_or_else(|| StreamError::InvalidFrameRate {
                sample: sample.describe(),
                frame_rate: info.frame_rate,
            })?;
        let mut landmarker = VideoLandmarker::open(self.factory, &self.options)?;
        let declared = info.declared_frame_count;
        debug!(declared, frame_rate = info.frame_rate, "streaming video");

        for frame_number in 1..=declared {
            let Some(frame) = source.read_frame() else {
                let decoded = frame_number - 1;
                self.report_short_read(sample, declared, decoded);
                return Ok(StreamOutcome::ShortRead { declared, decoded });
            };
            let timestamp_ms = clock.timestamp_ms(frame_number);
            let hands = landmarker.detect(&frame.into_rgb(), timestamp_ms)?;
            let keypoints = KeypointSet::new(hands.into_iter().map(Keypoint::from).collect());
            sample
                .frames
                .get_or_insert(frame_number)?
                .set(self.field.as_str(), keypoints);
        }
        Ok(StreamOutcome::Complete { frames: declared })
    }

    /// Annotates the selected samples (all when `selection` is `None`),
    /// persisting each one as soon as it is done, including after a failure.
    ///
    /// The landmarker options are checked before any video is touched.
    pub fn run<S>(
        &self,
        store: &S,
        dataset: &mut Dataset,
        selection: Option<&[usize]>,
        options: IterOptions,
    ) -> Result<StreamSummary, StreamError>
    where
        S: DatasetStore + ?Sized,
    {
        self.options.validate()?;
        let options = IterOptions {
            autosave: true,
            ..options
        };
        let mut summary = StreamSummary::default();
        for_each_sample(store, dataset, selection, options, |sample| {
            let outcome = self.annotate_sample(sample)?;
            summary.record(outcome);
            Ok::<_, StreamError>(())
        })?;
        info!(
            samples = summary.samples,
            short_reads = summary.short_reads,
            frames = summary.frames,
            field = %self.field,
            "hand landmarks written"
        );
        Ok(summary)
    }

    fn report_short_read(&self, sample: &Sample, declared: u32, decoded: u32) {
        let missing = declared - decoded;
        match self.short_read {
            ShortReadPolicy::Warn => warn!(
                sample = %sample.describe(),
                declared,
                decoded,
                missing,
                "video ended before its declared frame count"
            ),
            ShortReadPolicy::Silent => debug!(
                sample = %sample.describe(),
                declared,
                decoded,
                missing,
                "video ended before its declared frame count"
            ),
        }
    }
}

/// Parameters of one hand landmarker pass over a stored dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkerRun {
    pub dataset_name: String,
    pub model_asset_path: PathBuf,
    pub keypoints_field: String,
    /// Number of randomly chosen samples; zero or negative selects all.
    pub num_samples: i64,
    pub seed: u64,
}

/// Loads a dataset, installs the hand skeleton and streams the landmarker
/// over all samples or a seeded random subset.
pub fn run_hand_landmarker(
    store: &dyn DatasetStore,
    backend: &dyn VideoBackend,
    factory: &dyn LandmarkerFactory,
    config: &PipelineConfig,
    request: &LandmarkerRun,
) -> anyhow::Result<StreamSummary> {
    info!(name = %request.dataset_name, "loading dataset");
    let mut dataset = store
        .load(&request.dataset_name)
        .with_context(|| format!("load dataset '{}'", request.dataset_name))?;

    let options = LandmarkerOptions::video(&request.model_asset_path, config.max_hands);
    options.validate()?;

    info!("adding hand keypoint skeleton");
    dataset.default_skeleton = Some(KeypointSkeleton::hand());
    store.save(&dataset)?;

    let selection = match usize::try_from(request.num_samples) {
        Ok(count) if count > 0 => {
            info!(count, seed = request.seed, "sampling subset");
            Some(take(&dataset, count, request.seed))
        }
        _ => None,
    };

    info!(
        samples = selection.as_ref().map_or(dataset.len(), Vec::len),
        model = %request.model_asset_path.display(),
        field = %request.keypoints_field,
        "running hand landmarker"
    );
    let streamer = FrameAnnotationStreamer::new(backend, factory, options, request.keypoints_field.as_str())
        .with_short_read_policy(config.short_read);
    let summary = streamer.run(store, &mut dataset, selection.as_deref(), config.iter_options())?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pianoframe_dataset::MemoryStore;
    use pianoframe_video::{Frame, HandDetection, HandLandmarker, SyntheticBackend, SyntheticVideo};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        created: usize,
        timestamps: Vec<u64>,
        first_pixels: Vec<[u8; 3]>,
    }

    struct Scripted {
        calls: Arc<Mutex<Calls>>,
    }

    impl HandLandmarker for Scripted {
        fn detect(&mut self, frame: &Frame, timestamp_ms: u64) -> Result<Vec<HandDetection>, DetectorError> {
            let mut calls = self.calls.lock().unwrap();
            calls.timestamps.push(timestamp_ms);
            calls.first_pixels.push([frame.data[0], frame.data[1], frame.data[2]]);
            Ok(vec![HandDetection {
                handedness: "Left".to_string(),
                score: 0.9,
                points: vec![(0.25, 0.75)],
            }])
        }
    }

    #[derive(Default)]
    struct ScriptedFactory {
        calls: Arc<Mutex<Calls>>,
    }

    impl LandmarkerFactory for ScriptedFactory {
        fn create(&self, _options: &LandmarkerOptions) -> Result<Box<dyn HandLandmarker>, DetectorError> {
            self.calls.lock().unwrap().created += 1;
            Ok(Box::new(Scripted {
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn model_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn clock_matches_thirty_fps() {
        let mut clock = FrameClock::new(30.0).unwrap();
        let stamps: Vec<u64> = (1..=5).map(|i| clock.timestamp_ms(i)).collect();
        assert_eq!(stamps, vec![0, 33, 67, 100, 133]);
    }

    #[test]
    fn clock_never_repeats_at_high_rates() {
        let mut clock = FrameClock::new(3000.0).unwrap();
        let stamps: Vec<u64> = (1..=6).map(|i| clock.timestamp_ms(i)).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(FrameClock::new(0.0).is_none());
        assert!(FrameClock::new(f64::NAN).is_none());
    }

    #[test]
    fn short_read_leaves_later_frames_untouched() {
        let model = model_file();
        let backend = SyntheticBackend::new()
            .with_video("take.mp4", SyntheticVideo::new(8, 8, 5, 30.0).truncated_at(3));
        let factory = ScriptedFactory::default();
        let streamer = FrameAnnotationStreamer::new(
            &backend,
            &factory,
            LandmarkerOptions::video(model.path(), 2),
            "hands",
        );
        let mut sample = Sample::new("000001", "take.mp4");
        sample.frames.ensure(5);

        let outcome = streamer.annotate_sample(&mut sample).unwrap();
        assert_eq!(outcome, StreamOutcome::ShortRead { declared: 5, decoded: 3 });
        for n in 1..=3 {
            assert_eq!(sample.frames.get(n).unwrap().keypoints("hands").unwrap().keypoints.len(), 1);
        }
        assert!(sample.frames.get(4).unwrap().keypoints("hands").is_none());
        assert!(sample.frames.get(5).unwrap().keypoints("hands").is_none());
    }

    #[test]
    fn frames_reach_the_detector_as_rgb_with_increasing_timestamps() {
        let model = model_file();
        let backend = SyntheticBackend::new().with_video("take.mp4", SyntheticVideo::new(4, 4, 3, 30.0));
        let factory = ScriptedFactory::default();
        let streamer = FrameAnnotationStreamer::new(
            &backend,
            &factory,
            LandmarkerOptions::video(model.path(), 2),
            "hands",
        );
        let mut sample = Sample::new("000001", "take.mp4");
        let outcome = streamer.annotate_sample(&mut sample).unwrap();
        assert_eq!(outcome, StreamOutcome::Complete { frames: 3 });

        let calls = factory.calls.lock().unwrap();
        assert_eq!(calls.timestamps, vec![0, 33, 67]);
        assert_eq!(calls.first_pixels[0], [255, 0, 1]);
        assert_eq!(calls.first_pixels[2], [255, 0, 3]);
        let stored = sample.frames.get(2).unwrap().keypoints("hands").unwrap();
        assert_eq!(stored.keypoints[0].label, "Left");
        assert_eq!(stored.keypoints[0].points, vec![(0.25, 0.75)]);
    }

    #[test]
    fn each_video_gets_its_own_landmarker() {
        let model = model_file();
        let backend = SyntheticBackend::new()
            .with_video("a.mp4", SyntheticVideo::new(4, 4, 2, 25.0))
            .with_video("b.mp4", SyntheticVideo::new(4, 4, 2, 25.0));
        let factory = ScriptedFactory::default();
        let streamer = FrameAnnotationStreamer::new(
            &backend,
            &factory,
            LandmarkerOptions::video(model.path(), 2),
            "hands",
        );
        let store = MemoryStore::new();
        let mut dataset = Dataset::new("demo");
        dataset.add_sample("a.mp4");
        dataset.add_sample("b.mp4");
        store.create(&dataset).unwrap();

        let summary = streamer
            .run(&store, &mut dataset, None, IterOptions::default())
            .unwrap();
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.frames, 4);
        assert_eq!(backend.opened(), 2);

        let calls = factory.calls.lock().unwrap();
        assert_eq!(calls.created, 2);
        // timestamps restart for the second video's fresh handle
        assert_eq!(calls.timestamps, vec![0, 40, 0, 40]);

        let stored = store.load("demo").unwrap();
        assert!(stored.samples[1].frames.get(2).unwrap().keypoints("hands").is_some());
    }

    #[test]
    fn missing_model_is_fatal_before_any_video_opens() {
        let backend = SyntheticBackend::new().with_video("a.mp4", SyntheticVideo::new(4, 4, 2, 25.0));
        let factory = ScriptedFactory::default();
        let streamer = FrameAnnotationStreamer::new(
            &backend,
            &factory,
            LandmarkerOptions::video("/nonexistent/hand_landmarker.onnx", 2),
            "hands",
        );
        let store = MemoryStore::new();
        let mut dataset = Dataset::new("demo");
        dataset.add_sample("a.mp4");
        store.create(&dataset).unwrap();

        let err = streamer
            .run(&store, &mut dataset, None, IterOptions::default())
            .unwrap_err();
        assert!(matches!(err, StreamError::Detector(DetectorError::Init(_))));
        assert_eq!(backend.opened(), 0);
        assert_eq!(factory.calls.lock().unwrap().created, 0);
    }

    #[test]
    fn run_hand_landmarker_installs_skeleton_and_samples_subset() {
        let model = model_file();
        let mut backend = SyntheticBackend::new();
        let mut dataset = Dataset::new("rach3");
        for i in 0..4 {
            let path = format!("take_{i}.mp4");
            backend = backend.with_video(path.as_str(), SyntheticVideo::new(4, 4, 1, 30.0));
            dataset.add_sample(path);
        }
        let store = MemoryStore::new();
        store.create(&dataset).unwrap();
        let factory = ScriptedFactory::default();

        let request = LandmarkerRun {
            dataset_name: "rach3".to_string(),
            model_asset_path: model.path().to_path_buf(),
            keypoints_field: "hand_landmarker".to_string(),
            num_samples: 2,
            seed: 0x5EED,
        };
        let summary =
            run_hand_landmarker(&store, &backend, &factory, &PipelineConfig::default(), &request).unwrap();
        assert_eq!(summary.samples, 2);

        let stored = store.load("rach3").unwrap();
        assert_eq!(stored.default_skeleton, Some(KeypointSkeleton::hand()));
        let annotated = stored
            .samples
            .iter()
            .filter(|s| s.frames.get(1).is_some_and(|f| f.keypoints("hand_landmarker").is_some()))
            .count();
        assert_eq!(annotated, 2);
    }
}
