pub mod config;
pub mod draft;
pub mod lifecycle;
pub mod utils;
pub mod validation;

// 重新导出核心类型
pub use lifecycle::{
    FileDescriptor,
    LifecycleConfig,
    LifecycleError,
    LifecycleEvent,
    UploadId,
    UploadLifecycle,
    UploadLifecycleHandle,
    UploadSnapshot,
    UploadStatus,
    VideoId,
};

pub use draft::{
    Autosaver,
    Draft,
    DraftError,
    DraftStore,
    FileStorage,
    KeyValueStorage,
    MemoryStorage,
    StorageError,
    VideoMetadata,
    Visibility,
};

pub use validation::{validate_video_file, ValidationError, DEFAULT_MAX_FILE_SIZE};
