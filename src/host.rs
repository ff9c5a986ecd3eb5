//! Capability host: owns the registry, the reload pipeline and the watcher.
//!
//! Lifecycle: `new` → `initial_scan` → optional `start_watching` → `shutdown`.

use crate::capability::ModuleLoader;
use crate::config::DeckConfig;
use crate::error::ApiError;
use crate::registry::{CapabilityRegistry, SharedRegistry};
use crate::reload::{ReloadController, ReloadOutcome};
use crate::sink::CapabilitySink;
use crate::watch::{
    BatchReport, ChangeFilter, ChangeScheduler, Notifier, SchedulerHandle, WatchConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use walkdir::WalkDir;

pub struct CapabilityHost {
    config: DeckConfig,
    directory: PathBuf,
    watch: WatchConfig,
    controller: Arc<ReloadController>,
    sink: Arc<dyn CapabilitySink>,
    scheduler: Option<SchedulerHandle>,
}

impl CapabilityHost {
    /// Build a host for `workspace_root`. Nothing is loaded until `initial_scan`.
    pub fn new(config: DeckConfig, workspace_root: &Path, sink: Arc<dyn CapabilitySink>) -> Self {
        let directory = config.capabilities_dir(workspace_root);
        let watch = config.watch_config(workspace_root);
        let controller = Arc::new(ReloadController::new(
            ModuleLoader::new(config.capabilities.extensions.clone()),
            CapabilityRegistry::shared(),
            Arc::clone(&sink),
            config.default_timeout(),
        ));
        Self {
            config,
            directory,
            watch,
            controller,
            sink,
            scheduler: None,
        }
    }

    /// Construct, scan, and start watching unless watching is disabled.
    pub async fn start(
        config: DeckConfig,
        workspace_root: &Path,
        sink: Arc<dyn CapabilitySink>,
    ) -> Result<Self, ApiError> {
        let mut host = Self::new(config, workspace_root, sink);
        host.initial_scan().await?;
        if host.config.watch_enabled() {
            host.start_watching(None);
        } else {
            info!("Hot reload disabled, capabilities are loaded once");
        }
        Ok(host)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.controller.registry()
    }

    pub fn controller(&self) -> &Arc<ReloadController> {
        &self.controller
    }

    pub fn is_watching(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Eligible capability files directly inside the directory, sorted by name.
    pub fn discover(&self) -> Result<Vec<PathBuf>, ApiError> {
        if !self.directory.is_dir() {
            warn!(directory = %self.directory.display(), "Capability directory does not exist");
            return Ok(Vec::new());
        }
        let filter = ChangeFilter::new(&self.watch);
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                ApiError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to list {}: {}", self.directory.display(), e),
                ))
            })?;
            if entry.file_type().is_file() && filter.is_eligible(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Load every discovered file once. No debounce and no list-changed
    /// announcement; clients pick up the initial set from their first listing.
    pub async fn initial_scan(&self) -> Result<Vec<ReloadOutcome>, ApiError> {
        let files = self.discover()?;
        let mut outcomes = Vec::with_capacity(files.len());
        for path in &files {
            outcomes.push(self.controller.reload(path).await);
        }
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, ReloadOutcome::Failed { .. }))
            .count();
        info!(
            directory = %self.directory.display(),
            files = files.len(),
            failed,
            capabilities = self.registry().read().len(),
            "Initial capability scan complete"
        );
        Ok(outcomes)
    }

    /// Start the change scheduler. A failure to watch is logged and the host
    /// stays in load-once mode. Returns whether watching started.
    pub fn start_watching(&mut self, observer: Option<mpsc::UnboundedSender<BatchReport>>) -> bool {
        if self.scheduler.is_some() {
            return true;
        }
        let mut scheduler = ChangeScheduler::new(
            self.watch.clone(),
            self.controller.clone(),
            Notifier::new(Arc::clone(&self.sink)),
        );
        if let Some(observer) = observer {
            scheduler = scheduler.with_observer(observer);
        }
        match scheduler.start() {
            Ok(handle) => {
                self.scheduler = Some(handle);
                true
            }
            Err(e) => {
                error!(error = %e, "Hot reload could not start, continuing in load-once mode");
                false
            }
        }
    }

    /// Stop watching, retract everything from the sink and clear the registry.
    pub async fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await;
        }
        let removed = self.registry().write().clear();
        for name in &removed {
            self.sink.remove(name);
        }
        info!(capabilities = removed.len(), "Capability host shut down");
    }
}
