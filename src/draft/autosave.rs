//! Debounced background saving of the draft being edited.

use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use super::record::VideoMetadata;
use super::storage::KeyValueStorage;
use super::store::DraftStore;

/// 判断一条记录是否值得保存
pub type SavePredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

enum AutosaveCommand<T> {
    /// 记录变更，重新开始计时
    Update(T),
    /// 立即保存
    Flush(oneshot::Sender<()>),
}

pub struct Autosaver<T> {
    command_tx: mpsc::UnboundedSender<AutosaveCommand<T>>,
    worker_handle: JoinHandle<()>,
}

impl Autosaver<VideoMetadata> {
    /// Autosave for the wizard form: untitled metadata is never written.
    pub fn for_metadata<S>(store: DraftStore<S>, debounce: Duration) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        Self::spawn(store, debounce, Arc::new(VideoMetadata::has_title))
    }
}

impl<T> Autosaver<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn spawn<S>(store: DraftStore<S>, debounce: Duration, should_save: SavePredicate<T>) -> Self
    where
        S: KeyValueStorage + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker_handle = tokio::spawn(run(store, debounce, should_save, command_rx));

        Self {
            command_tx,
            worker_handle,
        }
    }

    /// Record a change. Returns `false` once the worker is gone.
    pub fn update(&self, record: T) -> bool {
        self.command_tx.send(AutosaveCommand::Update(record)).is_ok()
    }

    /// Save the pending record now instead of waiting out the debounce.
    pub async fn flush(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(AutosaveCommand::Flush(reply_tx)).is_ok() {
            let _ = reply_rx.await;
        }
    }

    /// Flush and stop the worker.
    pub async fn shutdown(self) {
        drop(self.command_tx);
        if let Err(err) = self.worker_handle.await {
            tracing::error!(%err, "autosave worker panicked");
        }
    }
}

async fn run<S, T>(
    store: DraftStore<S>,
    debounce: Duration,
    should_save: SavePredicate<T>,
    mut command_rx: mpsc::UnboundedReceiver<AutosaveCommand<T>>,
)
where
    S: KeyValueStorage + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let mut pending: Option<T> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            command = command_rx.recv() => match command {
                Some(AutosaveCommand::Update(record)) => {
                    if should_save(&record) {
                        pending = Some(record);
                        deadline = Some(Instant::now() + debounce);
                    } else {
                        // 和表单一致：不值得保存的变更会取消已排队的保存
                        pending = None;
                        deadline = None;
                    }
                }
                Some(AutosaveCommand::Flush(reply)) => {
                    deadline = None;
                    save(&store, pending.take()).await;
                    let _ = reply.send(());
                }
                None => {
                    save(&store, pending.take()).await;
                    break;
                }
            },
            _ = timer => {
                deadline = None;
                save(&store, pending.take()).await;
            }
        }
    }

    tracing::debug!(key = store.key(), "autosave worker stopped");
}

async fn save<S, T>(store: &DraftStore<S>, record: Option<T>)
where
    S: KeyValueStorage,
    T: Serialize,
{
    let Some(record) = record else {
        return;
    };

    // 失败已经在 store 里记录过，自动保存不打扰用户
    if store.save_draft(&record).await.is_ok() {
        tracing::debug!(key = store.key(), "autosaved draft");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::storage::MemoryStorage;

    fn titled(title: &str) -> VideoMetadata {
        VideoMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn store() -> DraftStore<MemoryStorage> {
        DraftStore::new(MemoryStorage::new(), "video-upload-draft")
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_saves_latest_once_quiet() {
        let store = store();
        let autosaver = Autosaver::for_metadata(store.clone(), Duration::from_secs(2));

        autosaver.update(titled("first"));
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        autosaver.update(titled("second"));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(!store.has_draft().await);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let draft = store.load_draft::<VideoMetadata>().await.unwrap().unwrap();
        assert_eq!(draft.record.title, "second");

        autosaver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_untitled_update_cancels_pending_save() {
        let store = store();
        let autosaver = Autosaver::for_metadata(store.clone(), Duration::from_secs(2));

        autosaver.update(titled("draft"));
        autosaver.update(titled(""));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!store.has_draft().await);

        autosaver.shutdown().await;
        assert!(!store.has_draft().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_shutdown_save_pending() {
        let store = store();
        let autosaver = Autosaver::for_metadata(store.clone(), Duration::from_secs(60));

        autosaver.update(titled("flushed"));
        autosaver.flush().await;
        let draft = store.load_draft::<VideoMetadata>().await.unwrap().unwrap();
        assert_eq!(draft.record.title, "flushed");

        autosaver.update(titled("on close"));
        autosaver.shutdown().await;
        let draft = store.load_draft::<VideoMetadata>().await.unwrap().unwrap();
        assert_eq!(draft.record.title, "on close");
    }
}
