//! Checks done at the file-input boundary, before a file reaches the lifecycle.

use thiserror::Error;
use crate::lifecycle::FileDescriptor;
use crate::utils::format_file_size;

/// 默认最大文件大小：5 GiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File must be a video, got `{mime_type}`")]
    NotVideo {
        mime_type: String,
    },

    #[error("File exceeds {}", format_file_size(*max))]
    TooLarge {
        size: u64,
        max: u64,
    },
}

pub fn validate_video_file(file: &FileDescriptor, max_bytes: u64) -> Result<(), ValidationError> {
    if !file.mime_type.starts_with("video/") {
        return Err(ValidationError::NotVideo {
            mime_type: file.mime_type.clone(),
        });
    }

    if file.size > max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size,
            max: max_bytes,
        });
    }

    Ok(())
}
