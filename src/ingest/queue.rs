use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::IngestError,
    import::{FileProcessor, ImportResult},
};

/// How one queued file ended.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ImportResult, IngestError>,
}

/// Called once the queue has been idle for the debounce window, with every
/// outcome since the previous call.
#[async_trait]
pub trait SettledHook: Send + Sync {
    async fn on_settled(&self, batch: Vec<FileOutcome>);
}

/// Cloneable sending side of the queue.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl QueueHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PathBuf>) -> Self {
        Self { tx }
    }

    pub fn enqueue(&self, path: PathBuf) -> Result<(), IngestError> {
        tracing::debug!("queued {}", path.display());

        self.tx
            .send(path)
            .map_err(|err| IngestError::QueueClosed(err.0))
    }
}

/// Processes files one at a time in arrival order.
pub struct IngestionQueue {
    handle: QueueHandle,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl IngestionQueue {
    pub fn start(
        processor: Arc<dyn FileProcessor>,
        hook: Arc<dyn SettledHook>,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run(rx, processor, hook, debounce, cancel.clone()));

        Self {
            handle: QueueHandle::new(tx),
            cancel,
            worker,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn enqueue(&self, path: PathBuf) -> Result<(), IngestError> {
        self.handle.enqueue(path)
    }

    /// Lets the file in flight finish, drops the rest and the pending settle.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        if let Err(err) = self.worker.await {
            tracing::error!("queue worker ended abnormally: {err}");
        }
    }
}

async fn run(
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    processor: Arc<dyn FileProcessor>,
    hook: Arc<dyn SettledHook>,
    debounce: Duration,
    cancel: CancellationToken,
) {
    let mut batch: Vec<FileOutcome> = Vec::new();
    let mut settle_at: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            path = rx.recv() => {
                let Some(path) = path else { break };
                settle_at = None;

                tracing::debug!("processing {}", path.display());
                let result = processor.process(&path).await;

                match &result {
                    Ok(result) => tracing::debug!(
                        "completed {}: {} inserted, {} skipped, {} invalid",
                        path.display(),
                        result.inserted,
                        result.skipped,
                        result.invalid
                    ),
                    Err(err) => tracing::error!("failed {}: {err}", path.display()),
                }

                batch.push(FileOutcome { path, result });

                if rx.is_empty() {
                    settle_at = Some(Instant::now() + debounce);
                }
            }

            _ = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                settle_at = None;
                tracing::debug!("queue settled after {} files", batch.len());
                hook.on_settled(std::mem::take(&mut batch)).await;
            }
        }
    }

    rx.close();
    let mut abandoned = 0;
    while let Ok(path) = rx.try_recv() {
        tracing::warn!("abandoned {}", path.display());
        abandoned += 1;
    }

    if abandoned > 0 || !batch.is_empty() {
        tracing::info!(
            "queue stopped with {abandoned} files pending and {} unsettled",
            batch.len()
        );
    }
}
