use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use pianoframe_domain::KeypointSkeleton;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{Dataset, Sample};
use crate::store::DatasetStore;
use crate::DatasetError;

const INFO_FILE: &str = "dataset.json";
const SAMPLES_DIR: &str = "samples";

#[derive(Debug, Serialize, Deserialize)]
struct DatasetInfo {
    name: String,
    #[serde(default)]
    default_skeleton: Option<KeypointSkeleton>,
    sample_ids: Vec<String>,
}

/// Directory-backed store.
///
/// Layout: `<root>/<name>/dataset.json` for dataset settings and sample order,
/// `<root>/<name>/samples/<id>.json` for each sample. Every file is replaced
/// atomically via a temporary sibling and a rename.
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| DatasetError::io(&root, err))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, name: &str) -> Result<PathBuf, DatasetError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(DatasetError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn sample_path(&self, name: &str, id: &str) -> Result<PathBuf, DatasetError> {
        Ok(self
            .dataset_dir(name)?
            .join(SAMPLES_DIR)
            .join(format!("{id}.json")))
    }

    fn write_info(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        let info = DatasetInfo {
            name: dataset.name.clone(),
            default_skeleton: dataset.default_skeleton.clone(),
            sample_ids: dataset.samples.iter().map(|s| s.id.clone()).collect(),
        };
        write_json_atomic(&self.dataset_dir(&dataset.name)?.join(INFO_FILE), &info)
    }
}

impl DatasetStore for JsonStore {
    fn list(&self) -> Result<Vec<String>, DatasetError> {
        let entries = fs::read_dir(&self.root).map_err(|err| DatasetError::io(&self.root, err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| DatasetError::io(&self.root, err))?;
            if entry.path().join(INFO_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn exists(&self, name: &str) -> Result<bool, DatasetError> {
        Ok(self.dataset_dir(name)?.join(INFO_FILE).is_file())
    }

    fn create(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        if self.exists(&dataset.name)? {
            return Err(DatasetError::AlreadyExists(dataset.name.clone()));
        }
        let samples_dir = self.dataset_dir(&dataset.name)?.join(SAMPLES_DIR);
        fs::create_dir_all(&samples_dir).map_err(|err| DatasetError::io(&samples_dir, err))?;
        info!(name = %dataset.name, samples = dataset.len(), root = %self.root.display(), "creating dataset");
        self.save(dataset)
    }

    fn load(&self, name: &str) -> Result<Dataset, DatasetError> {
        let info_path = self.dataset_dir(name)?.join(INFO_FILE);
        if !info_path.is_file() {
            return Err(DatasetError::NotFound(name.to_string()));
        }
        let info: DatasetInfo = read_json(&info_path)?;
        let samples = info
            .sample_ids
            .iter()
            .map(|id| read_json::<Sample>(&self.sample_path(name, id)?))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(name, samples = samples.len(), "loaded dataset");
        Ok(Dataset {
            name: info.name,
            default_skeleton: info.default_skeleton,
            samples,
        })
    }

    fn save(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        for sample in &dataset.samples {
            self.save_sample(&dataset.name, sample)?;
        }
        self.write_info(dataset)
    }

    fn save_sample(&self, dataset: &str, sample: &Sample) -> Result<(), DatasetError> {
        let path = self.sample_path(dataset, &sample.id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| DatasetError::io(parent, err))?;
        }
        write_json_atomic(&path, sample)
    }

    fn delete(&self, name: &str) -> Result<(), DatasetError> {
        let dir = self.dataset_dir(name)?;
        if !dir.join(INFO_FILE).is_file() {
            return Err(DatasetError::NotFound(name.to_string()));
        }
        info!(name, "deleting dataset");
        fs::remove_dir_all(&dir).map_err(|err| DatasetError::io(&dir, err))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let file = File::open(path).map_err(|err| DatasetError::io(path, err))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Writes `value` next to `path` and renames it into place.
fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), DatasetError> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(|err| DatasetError::io(&tmp, err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush().map_err(|err| DatasetError::io(&tmp, err))?;
    }
    fs::rename(&tmp, path).map_err(|err| DatasetError::io(path, err))
}
