use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pianoframe_dataset::{Dataset, Sample};
use pianoframe_domain::{DocumentExporter, ExportDocument, ExportFormat, JsonExporter};
use tracing::{debug, info, instrument};

/// Writes one `<stem>.json` keypoint document per sample.
pub struct AnnotationExporter {
    export_dir: PathBuf,
    field: String,
    format: ExportFormat,
}

impl AnnotationExporter {
    pub fn new(export_dir: impl Into<PathBuf>, field: impl Into<String>) -> Self {
        Self {
            export_dir: export_dir.into(),
            field: field.into(),
            format: ExportFormat::default(),
        }
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Frames `1..=last recorded frame`; frames without the field export an
    /// empty keypoint list.
    pub fn document(&self, sample: &Sample) -> ExportDocument {
        let frame_count = sample.frames.last_frame_number().unwrap_or(0);
        ExportDocument::build(sample.filename(), frame_count, |frame_number| {
            sample
                .frames
                .get(frame_number)
                .and_then(|frame| frame.keypoints(&self.field))
        })
    }

    pub fn output_path(&self, sample: &Sample) -> PathBuf {
        self.export_dir.join(format!("{}.json", sample.stem()))
    }

    /// Writes the sample's document, replacing any previous export.
    pub fn export_sample(&self, sample: &Sample) -> Result<PathBuf> {
        fs::create_dir_all(&self.export_dir)
            .with_context(|| format!("create export dir {}", self.export_dir.display()))?;
        let document = self.document(sample);
        let bytes = JsonExporter.export(&document, self.format)?;
        let path = self.output_path(sample);
        write_atomic(&path, &bytes)?;
        debug!(path = %path.display(), frames = document.frames.len(), "exported sample");
        Ok(path)
    }

    #[instrument(skip(self, dataset), fields(dataset = %dataset.name))]
    pub fn export_dataset(&self, dataset: &Dataset) -> Result<Vec<PathBuf>> {
        let paths = dataset
            .samples
            .iter()
            .map(|sample| self.export_sample(sample))
            .collect::<Result<Vec<_>>>()?;
        info!(
            files = paths.len(),
            dir = %self.export_dir.display(),
            field = %self.field,
            "exported keypoints"
        );
        Ok(paths)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("write {}", path.display()))
}
