mod autosave;
mod errors;
mod record;
mod storage;
mod store;

pub use autosave::{Autosaver, SavePredicate};
pub use errors::{DraftError, Result, StorageError};
pub use record::{Draft, VideoMetadata, Visibility};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::DraftStore;
