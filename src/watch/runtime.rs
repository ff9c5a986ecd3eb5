//! Change scheduler: debounces filesystem events into reload batches.

use super::events::{ChangeFilter, PendingChangeSet, WatchConfig};
use super::notifier::Notifier;
use crate::error::ApiError;
use crate::reload::{ReloadOutcome, Reloader};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Far-future deadline used while no batch is pending
const IDLE_DEADLINE: Duration = Duration::from_secs(3600);

/// One drained batch and what happened to each file in it
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub files: Vec<PathBuf>,
    pub outcomes: Vec<ReloadOutcome>,
}

/// Turns raw change events into sequential reload batches.
pub struct ChangeScheduler {
    config: WatchConfig,
    filter: ChangeFilter,
    reloader: Arc<dyn Reloader>,
    notifier: Notifier,
    observer: Option<mpsc::UnboundedSender<BatchReport>>,
}

/// Running scheduler. Dropping the handle leaves the task running; call `stop`.
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    watcher: Option<RecommendedWatcher>,
}

impl SchedulerHandle {
    /// Stop watching and wait for the scheduler task to exit. A batch that
    /// is already being processed runs to completion first.
    pub async fn stop(self) {
        self.shutdown.cancel();
        drop(self.watcher);
        if let Err(e) = self.task.await {
            error!(error = %e, "Change scheduler task ended abnormally");
        }
    }
}

impl ChangeScheduler {
    pub fn new(config: WatchConfig, reloader: Arc<dyn Reloader>, notifier: Notifier) -> Self {
        let filter = ChangeFilter::new(&config);
        Self {
            config,
            filter,
            reloader,
            notifier,
            observer: None,
        }
    }

    /// Receive a `BatchReport` after every processed batch
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<BatchReport>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Watch the configured directory and spawn the scheduler task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut self) -> Result<SchedulerHandle, ApiError> {
        let root = dunce::canonicalize(&self.config.root).map_err(|e| {
            ApiError::WatchError(format!(
                "Failed to resolve watch directory {}: {}",
                self.config.root.display(),
                e
            ))
        })?;
        self.filter = self.filter.with_root(root.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in changed_paths(event) {
                    if tx.send(path).is_err() {
                        debug!("Change scheduler gone, dropping watch event");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Watch error"),
        })
        .map_err(|e| ApiError::WatchError(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&root, RecursiveMode::NonRecursive)
            .map_err(|e| ApiError::WatchError(format!("Failed to watch directory: {}", e)))?;

        info!(
            directory = %root.display(),
            debounce_ms = self.config.debounce_ms,
            "Watching capability directory"
        );
        let mut handle = self.spawn_with_source(rx);
        handle.watcher = Some(watcher);
        Ok(handle)
    }

    /// Spawn the scheduler task fed by an arbitrary path source.
    pub fn spawn_with_source(self, rx: mpsc::UnboundedReceiver<PathBuf>) -> SchedulerHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(rx, shutdown.clone()));
        SchedulerHandle {
            shutdown,
            task,
            watcher: None,
        }
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<PathBuf>, shutdown: CancellationToken) {
        let window = Duration::from_millis(self.config.debounce_ms);
        let mut pending = PendingChangeSet::new();
        let debounce = tokio::time::sleep(IDLE_DEADLINE);
        tokio::pin!(debounce);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Some(path) => {
                        if !self.filter.is_eligible(&path) {
                            continue;
                        }
                        if pending.insert(path.clone()) {
                            debug!(path = %path.display(), "Queued capability file change");
                        }
                        debounce.as_mut().reset(tokio::time::Instant::now() + window);
                    }
                    None => {
                        if !pending.is_empty() {
                            self.dispatch(pending.drain()).await;
                        }
                        break;
                    }
                },
                _ = &mut debounce, if !pending.is_empty() => {
                    self.dispatch(pending.drain()).await;
                    debounce.as_mut().reset(tokio::time::Instant::now() + IDLE_DEADLINE);
                }
            }
        }

        debug!("Change scheduler stopped");
    }

    async fn dispatch(&self, files: Vec<PathBuf>) {
        let report = self.process_batch(files).await;
        self.notifier.batch_completed(&report).await;
        if let Some(observer) = &self.observer {
            let _ = observer.send(report);
        }
    }

    /// Reload every file of a batch, strictly one after another.
    pub async fn process_batch(&self, files: Vec<PathBuf>) -> BatchReport {
        info!(files = files.len(), "Processing capability change batch");
        let mut outcomes = Vec::with_capacity(files.len());
        for path in &files {
            outcomes.push(self.reloader.reload_one(path).await);
        }
        BatchReport { files, outcomes }
    }
}

/// Paths named by a create, modify or remove event.
fn changed_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths,
        _ => Vec::new(),
    }
}
