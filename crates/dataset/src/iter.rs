use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::model::{Dataset, Sample};
use crate::store::DatasetStore;
use crate::DatasetError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterOptions {
    /// Emit a progress event every `progress_every` samples.
    pub progress: bool,
    pub progress_every: usize,
    /// Persist each sample after the callback, even when it fails.
    pub autosave: bool,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            progress: true,
            progress_every: 10,
            autosave: true,
        }
    }
}

/// Seeded random subset of sample indices; `count` larger than the dataset
/// selects everything, in shuffled order.
pub fn take(dataset: &Dataset, count: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let amount = count.min(dataset.len());
    rand::seq::index::sample(&mut rng, dataset.len(), amount).into_vec()
}

/// Runs `f` over the selected samples (all when `selection` is `None`).
///
/// With `autosave`, a sample is written back through `store` after `f`
/// returns, including when `f` fails part-way, so partial annotations are kept.
/// When both fail, the error from `f` is returned and the save error is logged.
pub fn for_each_sample<S, F, E>(
    store: &S,
    dataset: &mut Dataset,
    selection: Option<&[usize]>,
    options: IterOptions,
    mut f: F,
) -> Result<usize, E>
where
    S: DatasetStore + ?Sized,
    F: FnMut(&mut Sample) -> Result<(), E>,
    E: From<DatasetError>,
{
    let indices: Vec<usize> = match selection {
        Some(selection) => selection.to_vec(),
        None => (0..dataset.len()).collect(),
    };
    let total = indices.len();
    let name = dataset.name.clone();
    for (position, index) in indices.into_iter().enumerate() {
        let Some(sample) = dataset.samples.get_mut(index) else {
            continue;
        };
        let outcome = f(sample);
        let saved = if options.autosave {
            store.save_sample(&name, sample)
        } else {
            Ok(())
        };
        match (outcome, saved) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(save_err)) => return Err(save_err.into()),
            (Err(err), Ok(())) => return Err(err),
            (Err(err), Err(save_err)) => {
                warn!(dataset = %name, sample = %sample.describe(), error = %save_err, "autosave failed");
                return Err(err);
            }
        }
        let done = position + 1;
        if options.progress && (done % options.progress_every.max(1) == 0 || done == total) {
            info!(dataset = %name, done, total, "progress");
        }
    }
    Ok(total)
}

/// Recursively finds files under `root` with the given extension.
pub fn find_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, DatasetError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            DatasetError::io(path, err.into())
        })?;
        let matches = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
