use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::debug;

use crate::model::{Dataset, Sample};
use crate::DatasetError;

/// Persistence for named datasets.
///
/// `save_sample` is the per-asset write unit: implementations must make a
/// sample's frame records durable without rewriting other samples.
pub trait DatasetStore: Send + Sync {
    fn list(&self) -> Result<Vec<String>, DatasetError>;

    fn exists(&self, name: &str) -> Result<bool, DatasetError> {
        Ok(self.list()?.iter().any(|existing| existing == name))
    }

    /// Persists a new dataset; fails if the name is taken.
    fn create(&self, dataset: &Dataset) -> Result<(), DatasetError>;

    fn load(&self, name: &str) -> Result<Dataset, DatasetError>;

    /// Persists dataset-level settings and every sample.
    fn save(&self, dataset: &Dataset) -> Result<(), DatasetError>;

    fn save_sample(&self, dataset: &str, sample: &Sample) -> Result<(), DatasetError>;

    fn delete(&self, name: &str) -> Result<(), DatasetError>;
}

/// Store that keeps datasets in process memory.
#[derive(Default)]
pub struct MemoryStore {
    datasets: Mutex<BTreeMap<String, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_datasets<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Dataset>) -> Result<T, DatasetError>,
    ) -> Result<T, DatasetError> {
        let mut guard = self
            .datasets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

impl DatasetStore for MemoryStore {
    fn list(&self) -> Result<Vec<String>, DatasetError> {
        self.with_datasets(|datasets| Ok(datasets.keys().cloned().collect()))
    }

    fn create(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        self.with_datasets(|datasets| {
            if datasets.contains_key(&dataset.name) {
                return Err(DatasetError::AlreadyExists(dataset.name.clone()));
            }
            debug!(name = %dataset.name, samples = dataset.len(), "creating in-memory dataset");
            datasets.insert(dataset.name.clone(), dataset.clone());
            Ok(())
        })
    }

    fn load(&self, name: &str) -> Result<Dataset, DatasetError> {
        self.with_datasets(|datasets| {
            datasets
                .get(name)
                .cloned()
                .ok_or_else(|| DatasetError::NotFound(name.to_string()))
        })
    }

    fn save(&self, dataset: &Dataset) -> Result<(), DatasetError> {
        self.with_datasets(|datasets| match datasets.get_mut(&dataset.name) {
            Some(stored) => {
                *stored = dataset.clone();
                Ok(())
            }
            None => Err(DatasetError::NotFound(dataset.name.clone())),
        })
    }

    fn save_sample(&self, dataset: &str, sample: &Sample) -> Result<(), DatasetError> {
        self.with_datasets(|datasets| {
            let stored = datasets
                .get_mut(dataset)
                .ok_or_else(|| DatasetError::NotFound(dataset.to_string()))?;
            match stored.samples.iter_mut().find(|s| s.id == sample.id) {
                Some(existing) => *existing = sample.clone(),
                None => stored.samples.push(sample.clone()),
            }
            Ok(())
        })
    }

    fn delete(&self, name: &str) -> Result<(), DatasetError> {
        self.with_datasets(|datasets| {
            datasets
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| DatasetError::NotFound(name.to_string()))
        })
    }
}
