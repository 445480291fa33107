use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use super::simulation::ProgressSource;
use super::types::{
    FileDescriptor,
    LifecycleCommand,
    LifecycleConfig,
    LifecycleEvent,
    UploadId,
    UploadSnapshot,
    UploadStatus,
    VideoId,
};

/// 定时器触发后要执行的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerStep {
    /// 上传进度 +1 次
    Tick,
    /// 100% 之后进入队列
    Settle,
    /// 队列 -> 处理中
    StartProcessing,
    /// 处理中 -> 可发布
    Finish,
}

#[derive(Debug)]
struct TimerFired {
    generation: u64,
    step: TimerStep,
}

pub struct LifecycleWorker {
    config: LifecycleConfig,
    source: Box<dyn ProgressSource>,
    snapshot: UploadSnapshot,
    file: Option<FileDescriptor>,

    /// 会话代数，每次开始/重试/重置都会递增
    generation: u64,
    /// 当前定时器链的取消令牌
    chain: Option<CancellationToken>,

    snapshot_tx: watch::Sender<UploadSnapshot>,
    event_tx: broadcast::Sender<LifecycleEvent>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
}

impl LifecycleWorker {
    pub(crate) async fn run(
        config: LifecycleConfig,
        source: Box<dyn ProgressSource>,
        mut command_rx: mpsc::Receiver<LifecycleCommand>,
        snapshot_tx: watch::Sender<UploadSnapshot>,
        event_tx: broadcast::Sender<LifecycleEvent>,
    ) {
        let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
        let mut worker = Self {
            config,
            source,
            snapshot: UploadSnapshot::default(),
            file: None,
            generation: 0,
            chain: None,
            snapshot_tx,
            event_tx,
            timer_tx,
        };

        // 主事件循环：命令和定时器都在这里串行处理
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => worker.handle_command(command),
                    None => break,
                },
                Some(fired) = timer_rx.recv() => {
                    worker.handle_timer(fired);
                }
            }
        }

        worker.cancel_chain();
        tracing::debug!("lifecycle worker stopped");
    }

    fn handle_command(&mut self, command: LifecycleCommand) {
        match command {
            LifecycleCommand::Start { file, reply } => {
                let upload_id = self.start_upload(file);
                let _ = reply.send(upload_id);
            }
            LifecycleCommand::Retry { reply } => {
                let restarted = self.retry_upload();
                let _ = reply.send(restarted);
            }
            LifecycleCommand::Fail { message, reply } => {
                let failed = match self.snapshot.status {
                    UploadStatus::Idle | UploadStatus::Error => {
                        tracing::debug!(status = %self.snapshot.status, "ignoring failure injection");
                        false
                    }
                    _ => {
                        self.fail(message);
                        true
                    }
                };
                let _ = reply.send(failed);
            }
            LifecycleCommand::Reset { reply } => {
                self.reset();
                let _ = reply.send(());
            }
        }
    }

    fn start_upload(&mut self, file: FileDescriptor) -> UploadId {
        self.begin_chain();

        let upload_id = UploadId::new();
        let from = self.snapshot.status;
        tracing::info!(
            %upload_id,
            file = %file.name,
            size = file.size,
            mime = %file.mime_type,
            "starting upload"
        );

        self.file = Some(file);
        self.snapshot = UploadSnapshot {
            progress: 0.0,
            status: UploadStatus::Uploading,
            upload_id: Some(upload_id),
            video_id: None,
            error_message: None,
        };
        self.publish();
        self.emit_status_change(upload_id, from, UploadStatus::Uploading);
        self.schedule(self.config.tick_interval, TimerStep::Tick);

        upload_id
    }

    fn retry_upload(&mut self) -> bool {
        let upload_id = match (self.snapshot.status, self.snapshot.upload_id) {
            (UploadStatus::Error, Some(upload_id)) => upload_id,
            (status, _) => {
                tracing::debug!(%status, "retry ignored, session is not in error");
                return false;
            }
        };

        self.begin_chain();
        tracing::info!(%upload_id, "retrying upload");

        self.snapshot.progress = 0.0;
        self.snapshot.status = UploadStatus::Uploading;
        self.snapshot.video_id = None;
        self.snapshot.error_message = None;
        self.publish();
        self.emit_status_change(upload_id, UploadStatus::Error, UploadStatus::Uploading);
        self.schedule(self.config.tick_interval, TimerStep::Tick);

        true
    }

    fn reset(&mut self) {
        self.cancel_chain();
        self.generation += 1;

        let previous = std::mem::take(&mut self.snapshot);
        self.file = None;
        self.publish();

        if let Some(upload_id) = previous.upload_id {
            tracing::info!(%upload_id, "session reset");
            self.emit_status_change(upload_id, previous.status, UploadStatus::Idle);
        }
    }

    fn fail(&mut self, message: String) {
        self.cancel_chain();

        let from = self.snapshot.status;
        self.snapshot.status = UploadStatus::Error;
        self.snapshot.error_message = Some(message.clone());
        self.publish();

        if let Some(upload_id) = self.snapshot.upload_id {
            tracing::error!(%upload_id, %from, %message, "upload failed");
            self.emit_status_change(upload_id, from, UploadStatus::Error);
            let _ = self.event_tx.send(LifecycleEvent::Failed { upload_id, message });
        }
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        if fired.generation != self.generation || self.chain.is_none() {
            tracing::debug!(
                generation = fired.generation,
                current = self.generation,
                step = ?fired.step,
                "dropping stale timer"
            );
            return;
        }

        match fired.step {
            TimerStep::Tick => self.on_tick(),
            TimerStep::Settle => {
                if self.snapshot.progress >= 100.0 && self.advance(UploadStatus::Queued) {
                    self.schedule(self.config.queued_delay, TimerStep::StartProcessing);
                }
            }
            TimerStep::StartProcessing => {
                if self.advance(UploadStatus::Processing) {
                    self.schedule(self.config.processing_delay, TimerStep::Finish);
                }
            }
            TimerStep::Finish => {
                if self.advance(UploadStatus::Ready) {
                    // 链路结束
                    self.chain = None;
                }
            }
        }
    }

    fn on_tick(&mut self) {
        if self.snapshot.status != UploadStatus::Uploading {
            return;
        }

        if self.source.should_fail() {
            self.fail("Upload failed".to_string());
            return;
        }

        let increment = self.source.next_increment().max(0.0);
        self.snapshot.progress = (self.snapshot.progress + increment).min(100.0);
        self.publish();

        if let Some(upload_id) = self.snapshot.upload_id {
            tracing::debug!(%upload_id, progress = self.snapshot.progress, "upload progress");
            let _ = self.event_tx.send(LifecycleEvent::Progress {
                upload_id,
                progress: self.snapshot.progress,
            });
        }

        if self.snapshot.progress >= 100.0 {
            self.schedule(self.config.settle_delay, TimerStep::Settle);
        } else {
            self.schedule(self.config.tick_interval, TimerStep::Tick);
        }
    }

    /// Moves to `to` only if it directly follows the current status.
    fn advance(&mut self, to: UploadStatus) -> bool {
        let from = self.snapshot.status;
        if from.next() != Some(to) {
            tracing::warn!(%from, %to, "refusing out of order transition");
            return false;
        }

        self.snapshot.status = to;
        if to == UploadStatus::Queued {
            self.snapshot.video_id = Some(VideoId::new());
        }
        self.publish();

        if let Some(upload_id) = self.snapshot.upload_id {
            tracing::info!(%upload_id, %from, %to, "status changed");
            self.emit_status_change(upload_id, from, to);

            if let (UploadStatus::Ready, Some(video_id)) = (to, self.snapshot.video_id) {
                let _ = self.event_tx.send(LifecycleEvent::Ready { upload_id, video_id });
            }
        }

        true
    }

    /// Cancels the running chain and opens a new generation for the next one.
    fn begin_chain(&mut self) {
        self.cancel_chain();
        self.generation += 1;
        self.chain = Some(CancellationToken::new());
    }

    fn cancel_chain(&mut self) {
        if let Some(token) = self.chain.take() {
            token.cancel();
        }
    }

    fn schedule(&self, delay: Duration, step: TimerStep) {
        let Some(token) = self.chain.clone() else {
            return;
        };

        let generation = self.generation;
        let timer_tx = self.timer_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = timer_tx.send(TimerFired { generation, step });
                }
            }
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }

    fn emit_status_change(&self, upload_id: UploadId, from: UploadStatus, to: UploadStatus) {
        let _ = self.event_tx.send(LifecycleEvent::StatusChanged { upload_id, from, to });
    }
}
