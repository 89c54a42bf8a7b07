use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use pianoframe_annotator::{
    run_hand_landmarker, AnnotationExporter, DatasetImporter, ImportOutcome, LandmarkerRun,
    PipelineConfig,
};
use pianoframe_dataset::{DatasetStore, JsonStore, MemoryStore};
use pianoframe_video::{
    DetectorError, Frame, HandDetection, HandLandmarker, LandmarkerFactory, LandmarkerOptions,
    SyntheticBackend, SyntheticVideo,
};

const BBOXES: &str = r#"[
  {"session_id": "2023-05-01_a2", "box": [
    {"box": {"x1": 100.0, "y1": 50.0, "x2": 300.0, "y2": 250.0},
     "name": "keyboard", "class": 0, "confidence": 0.97}
  ]},
  {"session_id": "2023-05-02_a1", "box": [
    {"box": {"x1": 0.0, "y1": 0.0, "x2": 640.0, "y2": 480.0},
     "name": "keyboard", "class": 0, "confidence": 0.5}
  ]}
]"#;

struct Recording {
    dir: tempfile::TempDir,
    backend: SyntheticBackend,
}

impl Recording {
    /// Empty video files on disk, served by the synthetic backend under the same paths.
    fn new(videos: &[(&str, SyntheticVideo)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = SyntheticBackend::new();
        for (relative, video) in videos {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
            backend = backend.with_video(path, *video);
        }
        fs::write(dir.path().join("bboxes.json"), BBOXES).unwrap();
        Self { dir, backend }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Reports one hand on odd frames and nothing on even frames.
struct AlternatingHands;

impl HandLandmarker for AlternatingHands {
    fn detect(&mut self, _frame: &Frame, timestamp_ms: u64) -> Result<Vec<HandDetection>, DetectorError> {
        if (timestamp_ms / 40) % 2 == 1 {
            return Ok(Vec::new());
        }
        Ok(vec![HandDetection {
            handedness: "Right".to_string(),
            score: 0.95,
            points: vec![(0.4, 0.6), (0.45, 0.55)],
        }])
    }
}

#[derive(Default)]
struct AlternatingFactory {
    created: AtomicUsize,
}

impl LandmarkerFactory for AlternatingFactory {
    fn create(&self, _options: &LandmarkerOptions) -> Result<Box<dyn HandLandmarker>, DetectorError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(AlternatingHands))
    }
}

fn model_file(dir: &Path) -> PathBuf {
    let path = dir.join("hand_landmarker.onnx");
    fs::write(&path, b"model").unwrap();
    path
}

#[test]
fn import_orders_tags_and_normalizes_keyboard_boxes() {
    let recording = Recording::new(&[
        ("train/2023-05-02_a1_perf_split1.mp4", SyntheticVideo::new(640, 480, 2, 25.0)),
        ("train/2023-05-01_a2_perf_split3.mp4", SyntheticVideo::new(640, 480, 4, 25.0)),
        ("test/2023-05-01_a2_perf_split1.mp4", SyntheticVideo::new(640, 480, 3, 25.0)),
    ]);
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    let importer = DatasetImporter::new(&store, &recording.backend, &config);

    let outcome = importer
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .unwrap();
    assert_eq!(outcome, ImportOutcome::Created { samples: 3 });

    let dataset = store.load("rach3").unwrap();
    let names: Vec<String> = dataset.samples.iter().map(|s| s.filename()).collect();
    assert_eq!(
        names,
        vec![
            "2023-05-01_a2_perf_split1.mp4",
            "2023-05-01_a2_perf_split3.mp4",
            "2023-05-02_a1_perf_split1.mp4",
        ]
    );
    assert!(dataset.samples[0].has_tag("test"));
    assert!(dataset.samples[1].has_tag("train"));
    assert_eq!(dataset.samples[1].get_str("session").unwrap(), "2023-05-01_a2");

    let sample = &dataset.samples[1];
    assert_eq!(sample.frames.len(), 4);
    for frame in sample.frames.iter() {
        let boxes = frame.detections("keyboard").unwrap();
        assert_eq!(boxes.detections.len(), 1);
        let detection = &boxes.detections[0];
        assert_eq!(detection.label, "keyboard");
        assert_eq!(detection.class_id, 0);
        assert_relative_eq!(detection.bounding_box.x, 0.15625);
        assert_relative_eq!(detection.bounding_box.y, 0.10417, epsilon = 1e-5);
        assert_relative_eq!(detection.bounding_box.width, 0.3125);
        assert_relative_eq!(detection.bounding_box.height, 0.41667, epsilon = 1e-5);
    }
}

#[test]
fn existing_dataset_is_kept_unless_overwritten() {
    let recording = Recording::new(&[(
        "train/2023-05-01_a2_perf_split3.mp4",
        SyntheticVideo::new(640, 480, 2, 25.0),
    )]);
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    let importer = DatasetImporter::new(&store, &recording.backend, &config);
    let bboxes = Path::new("bboxes.json");

    importer.import("rach3", recording.path(), bboxes, false).unwrap();
    let again = importer.import("rach3", recording.path(), bboxes, false).unwrap();
    assert_eq!(again, ImportOutcome::AlreadyExists);

    let replaced = importer.import("rach3", recording.path(), bboxes, true).unwrap();
    assert_eq!(replaced, ImportOutcome::Created { samples: 1 });
    assert_eq!(store.list().unwrap(), vec!["rach3".to_string()]);
}

#[test]
fn import_fails_when_a_session_has_no_boxes() {
    let recording = Recording::new(&[(
        "train/2023-06-01_a1_perf_split1.mp4",
        SyntheticVideo::new(640, 480, 2, 25.0),
    )]);
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    let importer = DatasetImporter::new(&store, &recording.backend, &config);

    let err = importer
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .unwrap_err();
    assert!(format!("{err:#}").contains("2023-06-01_a1"));
    assert!(!store.exists("rach3").unwrap());
    assert_eq!(recording.backend.opened(), 0);
}

#[test]
fn rerun_after_fixing_boxes_builds_the_dataset() {
    let recording = Recording::new(&[(
        "train/2023-05-01_a2_perf_split3.mp4",
        SyntheticVideo::new(640, 480, 2, 25.0),
    )]);
    fs::write(recording.path().join("bboxes.json"), "[]").unwrap();
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    let importer = DatasetImporter::new(&store, &recording.backend, &config);
    let bboxes = Path::new("bboxes.json");

    assert!(importer.import("rach3", recording.path(), bboxes, false).is_err());
    assert!(!store.exists("rach3").unwrap());

    fs::write(recording.path().join("bboxes.json"), BBOXES).unwrap();
    let outcome = importer.import("rach3", recording.path(), bboxes, false).unwrap();
    assert_eq!(outcome, ImportOutcome::Created { samples: 1 });

    let dataset = store.load("rach3").unwrap();
    let frame = dataset.samples[0].frames.get(1).unwrap();
    assert_eq!(frame.detections("keyboard").unwrap().detections.len(), 1);
}

#[test]
fn duplicate_box_entries_abort_before_anything_is_stored() {
    let recording = Recording::new(&[(
        "train/2023-05-01_a2_perf_split3.mp4",
        SyntheticVideo::new(640, 480, 2, 25.0),
    )]);
    let duplicated = r#"[
      {"session_id": "2023-05-01_a2", "box": []},
      {"session_id": "2023-05-01_a2", "box": []}
    ]"#;
    fs::write(recording.path().join("bboxes.json"), duplicated).unwrap();
    let store = JsonStore::open(recording.path().join("store")).unwrap();
    let config = PipelineConfig::default();

    let err = DatasetImporter::new(&store, &recording.backend, &config)
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .unwrap_err();
    assert!(format!("{err:#}").contains("found 2"));
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn import_rejects_unparseable_file_names() {
    let recording = Recording::new(&[("train/warmup.mp4", SyntheticVideo::new(640, 480, 2, 25.0))]);
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    let importer = DatasetImporter::new(&store, &recording.backend, &config);

    assert!(importer
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .is_err());
    assert!(!store.exists("rach3").unwrap());
}

#[test]
fn annotate_and_export_through_the_json_store() {
    let recording = Recording::new(&[(
        "train/2023-05-01_a2_perf_split3.mp4",
        SyntheticVideo::new(640, 480, 4, 25.0).truncated_at(3),
    )]);
    let store = JsonStore::open(recording.path().join("store")).unwrap();
    let config = PipelineConfig::default();

    DatasetImporter::new(&store, &recording.backend, &config)
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .unwrap();

    let factory = AlternatingFactory::default();
    let request = LandmarkerRun {
        dataset_name: "rach3".to_string(),
        model_asset_path: model_file(recording.path()),
        keypoints_field: "hand_landmarker".to_string(),
        num_samples: -1,
        seed: 0x5EED,
    };
    let summary =
        run_hand_landmarker(&store, &recording.backend, &factory, &config, &request).unwrap();
    assert_eq!(summary.samples, 1);
    assert_eq!(summary.short_reads, 1);
    assert_eq!(summary.frames, 3);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);

    let dataset = store.load("rach3").unwrap();
    let sample = &dataset.samples[0];
    assert!(sample.frames.get(3).unwrap().keypoints("hand_landmarker").is_some());
    assert!(sample.frames.get(4).unwrap().keypoints("hand_landmarker").is_none());
    assert!(sample.frames.get(4).unwrap().detections("keyboard").is_some());

    let export_dir = recording.path().join("export");
    let written = AnnotationExporter::new(&export_dir, "hand_landmarker")
        .export_dataset(&dataset)
        .unwrap();
    assert_eq!(written, vec![export_dir.join("2023-05-01_a2_perf_split3.json")]);

    let document: serde_json::Value =
        serde_json::from_slice(&fs::read(&written[0]).unwrap()).unwrap();
    assert_eq!(document["filename"], "2023-05-01_a2_perf_split3.mp4");
    let frames = document["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["frame_number"], 1);
    assert_eq!(frames[0]["keypoints"][0]["label"], "Right");
    assert_eq!(frames[0]["keypoints"][0]["points"], serde_json::json!([[0.4, 0.6], [0.45, 0.55]]));
    assert_eq!(frames[1]["keypoints"], serde_json::json!([]));
    assert_eq!(frames[3]["keypoints"], serde_json::json!([]));
}

#[test]
fn missing_model_stops_the_run_before_streaming() {
    let recording = Recording::new(&[(
        "train/2023-05-01_a2_perf_split3.mp4",
        SyntheticVideo::new(640, 480, 2, 25.0),
    )]);
    let store = MemoryStore::new();
    let config = PipelineConfig::default();
    DatasetImporter::new(&store, &recording.backend, &config)
        .import("rach3", recording.path(), Path::new("bboxes.json"), false)
        .unwrap();

    let factory = AlternatingFactory::default();
    let request = LandmarkerRun {
        dataset_name: "rach3".to_string(),
        model_asset_path: recording.path().join("missing.onnx"),
        keypoints_field: "hand_landmarker".to_string(),
        num_samples: -1,
        seed: 0x5EED,
    };
    assert!(run_hand_landmarker(&store, &recording.backend, &factory, &config, &request).is_err());
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    let dataset = store.load("rach3").unwrap();
    assert!(dataset.samples[0].frames.get(1).unwrap().keypoints("hand_landmarker").is_none());
}
