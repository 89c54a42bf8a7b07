use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset '{0}' not found")]
    NotFound(String),
    #[error("dataset '{0}' already exists")]
    AlreadyExists(String),
    #[error("invalid dataset name '{0}'")]
    InvalidName(String),
    #[error("sample {0} has no metadata")]
    MissingMetadata(String),
    #[error("sample {sample} has no field '{field}'")]
    MissingField { sample: String, field: String },
    #[error("frame numbers start at 1")]
    InvalidFrameNumber,
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DatasetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
