//! Reload controller: unregister → load → adapt & register, one file at a time.

use crate::adapter::CapabilityAdapter;
use crate::capability::{LoadOutcome, ModuleLoader};
use crate::registry::{RegisteredCapability, SharedRegistry};
use crate::sink::{CapabilitySink, ExposedCapability};
use crate::types::{CapabilityName, Epoch, FileIdentity};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Terminal state of one `reload_one` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The file is gone; everything it owned was removed
    Retracted {
        file: String,
        removed: Vec<CapabilityName>,
    },
    /// The file could not be loaded and now contributes nothing
    Failed {
        file: String,
        error: String,
        removed: Vec<CapabilityName>,
    },
    /// The file loaded; `names` is everything it now contributes (may be empty)
    Active {
        file: String,
        epoch: Epoch,
        names: Vec<CapabilityName>,
    },
}

impl ReloadOutcome {
    pub fn file(&self) -> &str {
        match self {
            ReloadOutcome::Retracted { file, .. }
            | ReloadOutcome::Failed { file, .. }
            | ReloadOutcome::Active { file, .. } => file,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReloadOutcome::Active { .. })
    }
}

/// Anything that can reload a single capability file.
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn reload_one(&self, path: &Path) -> ReloadOutcome;
}

/// Drives the registry and the sink from freshly loaded files.
pub struct ReloadController {
    loader: ModuleLoader,
    registry: SharedRegistry,
    sink: Arc<dyn CapabilitySink>,
    default_timeout: Duration,
}

impl ReloadController {
    pub fn new(
        loader: ModuleLoader,
        registry: SharedRegistry,
        sink: Arc<dyn CapabilitySink>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            loader,
            registry,
            sink,
            default_timeout,
        }
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &Arc<dyn CapabilitySink> {
        &self.sink
    }

    /// Reload one file to a terminal state. Never fails; failures are
    /// contained to this file and reported in the outcome.
    pub async fn reload(&self, path: &Path) -> ReloadOutcome {
        let Some(file) = FileIdentity::from_path(path) else {
            warn!(path = %path.display(), "Ignoring capability file without a usable name");
            return ReloadOutcome::Failed {
                file: path.display().to_string(),
                error: "file name is not valid UTF-8".to_string(),
                removed: Vec::new(),
            };
        };

        let (prior_digest, previously) = {
            let mut registry = self.registry.write();
            let digest = registry.file(&file.file_name).map(|r| r.digest);
            (digest, registry.unregister_file(&file.file_name))
        };

        let outcome = match self.loader.load(path).await {
            LoadOutcome::NotFound => {
                info!(file = %file, removed = previously.len(), "Capability file removed");
                ReloadOutcome::Retracted {
                    file: file.file_name.clone(),
                    removed: previously.clone(),
                }
            }
            LoadOutcome::Failed(e) => {
                error!(file = %file, error = %e, "Failed to load capability file");
                ReloadOutcome::Failed {
                    file: file.file_name.clone(),
                    error: e.to_string(),
                    removed: previously.clone(),
                }
            }
            LoadOutcome::Loaded(module) => {
                if prior_digest == Some(module.digest) {
                    debug!(
                        file = %file,
                        epoch = module.epoch,
                        digest = %hex::encode(module.digest),
                        "Capability file content unchanged"
                    );
                }
                let capabilities: Vec<RegisteredCapability> = module
                    .exports
                    .into_iter()
                    .map(|(export, descriptor)| {
                        let name = file.capability_name(&export);
                        RegisteredCapability {
                            adapter: Arc::new(CapabilityAdapter::new(
                                name.clone(),
                                Arc::new(descriptor),
                                self.default_timeout,
                            )),
                            name,
                            owner: file.file_name.clone(),
                            epoch: module.epoch,
                        }
                    })
                    .collect();

                let delta = self.registry.write().register_file(
                    &file,
                    module.epoch,
                    module.digest,
                    capabilities,
                );
                info!(
                    file = %file,
                    epoch = module.epoch,
                    capabilities = ?delta.installed,
                    skipped = module.skipped.len(),
                    "Capability file loaded"
                );
                ReloadOutcome::Active {
                    file: file.file_name.clone(),
                    epoch: module.epoch,
                    names: delta.installed,
                }
            }
        };

        let installed: &[CapabilityName] = match &outcome {
            ReloadOutcome::Active { names, .. } => names.as_slice(),
            _ => &[],
        };
        self.reconcile_sink(&previously, installed);
        outcome
    }

    /// Push the registry's view of the touched names to the sink: names that
    /// left the registry are removed, installed names are upserted.
    fn reconcile_sink(&self, previously: &[CapabilityName], installed: &[CapabilityName]) {
        let registry = self.registry.read();
        for name in previously {
            if !registry.contains(name) {
                debug!(capability = %name, "Removing capability from sink");
                self.sink.remove(name);
            }
        }
        for name in installed {
            if let Some(capability) = registry.get(name) {
                self.sink.register(ExposedCapability::from(capability));
            }
        }
    }
}

#[async_trait]
impl Reloader for ReloadController {
    async fn reload_one(&self, path: &Path) -> ReloadOutcome {
        self.reload(path).await
    }
}
