use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::simulation::MAX_INCREMENT;

// 用于序列化 Duration（毫秒）
fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// 上传会话唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upload_{}", self.0.simple())
    }
}

/// 视频标识，进入队列时分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct VideoId(Uuid);

impl VideoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "video_{}", self.0.simple())
    }
}

/// 上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 空闲
    #[default]
    Idle,
    /// 上传中
    Uploading,
    /// 等待处理
    Queued,
    /// 处理中
    Processing,
    /// 可发布
    Ready,
    /// 失败
    Error,
}

impl UploadStatus {
    /// The only status a timer chain may move into from `self`.
    pub fn next(self) -> Option<UploadStatus> {
        match self {
            UploadStatus::Uploading => Some(UploadStatus::Queued),
            UploadStatus::Queued => Some(UploadStatus::Processing),
            UploadStatus::Processing => Some(UploadStatus::Ready),
            _ => None,
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Queued => "queued",
            UploadStatus::Processing => "processing",
            UploadStatus::Ready => "ready",
            UploadStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// 当前会话的只读快照
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSnapshot {
    /// 上传百分比，0..=100
    pub progress: f64,
    pub status: UploadStatus,
    pub upload_id: Option<UploadId>,
    pub video_id: Option<VideoId>,
    /// 仅在 `Error` 状态下存在
    pub error_message: Option<String>,
}

impl UploadSnapshot {
    pub fn can_publish(&self) -> bool {
        self.status == UploadStatus::Ready
    }

    /// Closing the wizard now would throw away transferred bytes.
    pub fn is_cancellable_upload(&self) -> bool {
        self.status == UploadStatus::Uploading && self.progress < 100.0
    }
}

/// 待上传的文件描述（由调用方校验过）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

/// 模拟流水线配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// 进度更新间隔
    #[serde(
        rename = "tick_interval_ms",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub tick_interval: Duration,

    /// 每次进度更新的最大增量，超过 15 按 15 处理
    pub max_increment: f64,

    /// 上传到 100% 后进入队列前的等待
    #[serde(
        rename = "settle_delay_ms",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub settle_delay: Duration,

    /// 队列 -> 处理中
    #[serde(
        rename = "queued_delay_ms",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub queued_delay: Duration,

    /// 处理中 -> 可发布
    #[serde(
        rename = "processing_delay_ms",
        serialize_with = "serialize_duration_ms",
        deserialize_with = "deserialize_duration_ms"
    )]
    pub processing_delay: Duration,

    /// 每次进度更新时注入失败的概率
    pub failure_rate: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            max_increment: MAX_INCREMENT,
            settle_delay: Duration::from_millis(500),
            queued_delay: Duration::from_secs(2),
            processing_delay: Duration::from_secs(3),
            failure_rate: 0.0,
        }
    }
}

/// 生命周期命令
pub enum LifecycleCommand {
    /// 开始上传（替换当前会话）
    Start {
        file: FileDescriptor,
        reply: oneshot::Sender<UploadId>,
    },

    /// 从失败状态重试
    Retry {
        reply: oneshot::Sender<bool>,
    },

    /// 注入失败
    Fail {
        message: String,
        reply: oneshot::Sender<bool>,
    },

    /// 重置到空闲
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// 生命周期事件
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// 状态变更
    StatusChanged {
        upload_id: UploadId,
        from: UploadStatus,
        to: UploadStatus,
    },

    /// 进度更新
    Progress {
        upload_id: UploadId,
        progress: f64,
    },

    /// 会话失败
    Failed {
        upload_id: UploadId,
        message: String,
    },

    /// 处理完成，可以发布
    Ready {
        upload_id: UploadId,
        video_id: VideoId,
    },
}

// 静态断言确保类型是 Send 的
const _: () = {
    fn assert_send<T: Send>() {}
    fn assert_types() {
        assert_send::<LifecycleCommand>();
        assert_send::<LifecycleEvent>();
        assert_send::<UploadSnapshot>();
    }
};
