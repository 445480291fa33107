mod errors;
mod manager;
mod simulation;
mod types;
mod worker;

pub use errors::{LifecycleError, Result};
pub use manager::{UploadLifecycle, UploadLifecycleHandle};
pub use simulation::{FixedIncrements, ProgressSource, RandomIncrements, MAX_INCREMENT};
pub use types::{
    FileDescriptor,
    LifecycleConfig,
    LifecycleEvent,
    UploadId,
    UploadSnapshot,
    UploadStatus,
    VideoId,
};
