use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use super::errors::{LifecycleError, Result};
use super::simulation::{ProgressSource, RandomIncrements, MAX_INCREMENT};
use super::types::{
    FileDescriptor,
    LifecycleCommand,
    LifecycleConfig,
    LifecycleEvent,
    UploadId,
    UploadSnapshot,
};
use super::worker::LifecycleWorker;

#[derive(Clone)]
pub struct UploadLifecycle {
    command_tx: mpsc::Sender<LifecycleCommand>,
    event_tx: broadcast::Sender<LifecycleEvent>,
    snapshot_rx: watch::Receiver<UploadSnapshot>,
}

/// 生命周期句柄 - 包含管理器和工作任务
pub struct UploadLifecycleHandle {
    pub lifecycle: UploadLifecycle,
    pub worker_handle: JoinHandle<()>,
}

impl UploadLifecycleHandle {
    pub async fn shutdown(self) -> Result<()> {
        drop(self.lifecycle);
        self.worker_handle.await
            .map_err(|err| LifecycleError::internal_error(format!("Worker panic: {}", err)))
    }
}

impl UploadLifecycle {
    /// Spawns a worker driven by random increments.
    pub fn new(config: LifecycleConfig) -> UploadLifecycleHandle {
        if config.max_increment > MAX_INCREMENT {
            tracing::warn!(max_increment = config.max_increment, cap = MAX_INCREMENT, "max_increment capped");
        }
        let source = RandomIncrements::new(config.max_increment, config.failure_rate);
        Self::with_source(config, source)
    }

    pub fn with_source(config: LifecycleConfig, source: impl ProgressSource) -> UploadLifecycleHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        // 最大缓存 256 个事件
        let (event_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(UploadSnapshot::default());

        let worker_handle = tokio::spawn(LifecycleWorker::run(
            config,
            Box::new(source),
            command_rx,
            snapshot_tx,
            event_tx.clone(),
        ));

        let lifecycle = Self {
            command_tx,
            event_tx,
            snapshot_rx,
        };

        UploadLifecycleHandle {
            lifecycle,
            worker_handle,
        }
    }

    /// Start a new session, replacing whatever was running.
    pub async fn start_upload(&self, file: FileDescriptor) -> Result<UploadId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LifecycleCommand::Start { file, reply: reply_tx }).await?;

        reply_rx
            .await
            .map_err(|err| LifecycleError::internal_error(err.to_string()))
    }

    /// Restart a failed session. `Ok(false)` means there was nothing to retry.
    pub async fn retry_upload(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LifecycleCommand::Retry { reply: reply_tx }).await?;

        reply_rx
            .await
            .map_err(|err| LifecycleError::internal_error(err.to_string()))
    }

    /// Inject a failure into the active session.
    pub async fn fail(&self, message: impl Into<String>) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LifecycleCommand::Fail {
            message: message.into(),
            reply: reply_tx,
        })
        .await?;

        reply_rx
            .await
            .map_err(|err| LifecycleError::internal_error(err.to_string()))
    }

    /// Back to idle. Any scheduled step of the old session is dropped.
    pub async fn reset(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(LifecycleCommand::Reset { reply: reply_tx }).await?;

        reply_rx
            .await
            .map_err(|err| LifecycleError::internal_error(err.to_string()))
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<UploadSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until the snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<UploadSnapshot>
    where
        F: FnMut(&UploadSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| LifecycleError::ManagerShutdown)?;

        Ok(snapshot.clone())
    }

    /// 订阅事件
    ///
    /// 注意：接收速度跟不上时可能丢失事件（lagged error），
    /// 需要完整状态时应读取快照
    pub fn subscribe_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, command: LifecycleCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| LifecycleError::ManagerShutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::lifecycle::simulation::FixedIncrements;
    use crate::lifecycle::types::UploadStatus;

    fn video() -> FileDescriptor {
        FileDescriptor::new("clip.mp4", 2_000_000_000, "video/mp4")
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_monotonic_and_clamped() {
        let handle = UploadLifecycle::with_source(LifecycleConfig::default(), FixedIncrements::new(30.0));
        let lifecycle = &handle.lifecycle;
        let mut rx = lifecycle.watch();

        lifecycle.start_upload(video()).await.unwrap();

        let mut last = 0.0;
        let mut seen_hundred = false;
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status != UploadStatus::Uploading {
                assert_eq!(snapshot.status, UploadStatus::Queued);
                assert_eq!(snapshot.progress, 100.0);
                break;
            }
            assert!(snapshot.progress >= last);
            assert!(snapshot.progress <= 100.0);
            seen_hundred |= snapshot.progress == 100.0;
            last = snapshot.progress;
        }
        assert!(seen_hundred);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_max_increment_is_capped() {
        let config = LifecycleConfig { max_increment: 80.0, ..Default::default() };
        let handle = UploadLifecycle::new(config);
        let lifecycle = &handle.lifecycle;
        let mut rx = lifecycle.watch();

        lifecycle.start_upload(video()).await.unwrap();

        let mut last = 0.0;
        loop {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.status != UploadStatus::Uploading {
                break;
            }
            assert!(snapshot.progress - last <= MAX_INCREMENT, "step {} above cap", snapshot.progress - last);
            last = snapshot.progress;
        }

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_status_chain() {
        let handle = UploadLifecycle::with_source(LifecycleConfig::default(), FixedIncrements::new(50.0));
        let lifecycle = &handle.lifecycle;
        let mut events = lifecycle.subscribe_events();

        let upload_id = lifecycle.start_upload(video()).await.unwrap();
        lifecycle.wait_for(|s| s.status == UploadStatus::Ready).await.unwrap();

        let mut statuses = Vec::new();
        let mut ready = None;
        while let Ok(event) = events.try_recv() {
            match event {
                LifecycleEvent::StatusChanged { upload_id: id, to, .. } => {
                    assert_eq!(id, upload_id);
                    statuses.push(to);
                }
                LifecycleEvent::Ready { video_id, .. } => ready = Some(video_id),
                _ => {}
            }
        }

        assert_eq!(statuses, vec![
            UploadStatus::Uploading,
            UploadStatus::Queued,
            UploadStatus::Processing,
            UploadStatus::Ready,
        ]);
        assert_eq!(ready, lifecycle.snapshot().video_id);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_outside_error_is_noop() {
        let handle = UploadLifecycle::with_source(LifecycleConfig::default(), FixedIncrements::new(10.0));
        let lifecycle = &handle.lifecycle;

        assert!(!lifecycle.retry_upload().await.unwrap());
        lifecycle.start_upload(video()).await.unwrap();
        assert!(!lifecycle.retry_upload().await.unwrap());
        assert_eq!(lifecycle.snapshot().status, UploadStatus::Uploading);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_while_idle_is_ignored() {
        let handle = UploadLifecycle::with_source(LifecycleConfig::default(), FixedIncrements::new(10.0));
        let lifecycle = &handle.lifecycle;

        assert!(!lifecycle.fail("boom").await.unwrap());
        assert_eq!(lifecycle.snapshot(), UploadSnapshot::default());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_stops_timers() {
        let handle = UploadLifecycle::with_source(LifecycleConfig::default(), FixedIncrements::new(10.0));
        let lifecycle = &handle.lifecycle;

        lifecycle.start_upload(video()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert!(lifecycle.fail("network lost").await.unwrap());
        let failed = lifecycle.snapshot();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(lifecycle.snapshot(), failed);
        assert_eq!(failed.status, UploadStatus::Error);
        assert_eq!(failed.progress, 20.0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_after_worker_exit_fail() {
        let handle = UploadLifecycle::new(LifecycleConfig::default());
        let lifecycle = handle.lifecycle.clone();

        handle.worker_handle.abort();
        let _ = handle.worker_handle.await;

        let err = lifecycle.start_upload(video()).await.unwrap_err();
        assert!(matches!(err, LifecycleError::ManagerShutdown));
    }

    #[tokio::test]
    async fn test_shutdown_joins_worker() {
        let handle = UploadLifecycle::new(LifecycleConfig::default());
        handle.lifecycle.start_upload(video()).await.unwrap();
        handle.shutdown().await.unwrap();
    }
}
