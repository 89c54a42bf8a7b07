pub mod error;
pub mod iter;
pub mod json;
pub mod model;
pub mod store;

pub use crate::error::DatasetError;
pub use crate::iter::{find_files, for_each_sample, take, IterOptions};
pub use crate::json::JsonStore;
pub use crate::model::{Dataset, FrameRecord, Frames, Sample};
pub use crate::store::{DatasetStore, MemoryStore};
