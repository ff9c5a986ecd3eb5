//! Sink port: the protocol layer that exposes capabilities to callers.
//!
//! The registry stays the source of truth; sinks only receive upserts,
//! removals and "list changed" announcements through this public surface.

use crate::adapter::CapabilityAdapter;
use crate::error::ApiError;
use crate::registry::RegisteredCapability;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a sink needs to expose one capability
#[derive(Debug, Clone)]
pub struct ExposedCapability {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub handler: Arc<CapabilityAdapter>,
}

impl From<&RegisteredCapability> for ExposedCapability {
    fn from(capability: &RegisteredCapability) -> Self {
        Self {
            name: capability.name.clone(),
            description: capability.adapter.description().to_string(),
            input_schema: capability.adapter.input_schema().cloned(),
            handler: Arc::clone(&capability.adapter),
        }
    }
}

/// External protocol sink.
#[async_trait]
pub trait CapabilitySink: Send + Sync {
    /// Register or replace a capability under its name
    fn register(&self, capability: ExposedCapability);

    /// Stop exposing a capability; unknown names are ignored
    fn remove(&self, name: &str);

    /// Tell connected clients the capability list may have changed
    async fn notify_list_changed(&self) -> Result<(), ApiError>;
}

/// In-process sink that keeps exposed capabilities in memory.
///
/// Used for one-shot CLI commands and as a test double.
#[derive(Default)]
pub struct MemorySink {
    capabilities: RwLock<BTreeMap<String, ExposedCapability>>,
    notifications: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ExposedCapability> {
        self.capabilities.read().get(name).cloned()
    }

    /// Exposed names in sorted order
    pub fn names(&self) -> Vec<String> {
        self.capabilities.read().keys().cloned().collect()
    }

    /// Number of list-changed announcements received
    pub fn notification_count(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilitySink for MemorySink {
    fn register(&self, capability: ExposedCapability) {
        self.capabilities
            .write()
            .insert(capability.name.clone(), capability);
    }

    fn remove(&self, name: &str) {
        self.capabilities.write().remove(name);
    }

    async fn notify_list_changed(&self) -> Result<(), ApiError> {
        self.notifications.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
