//! Capability table: name → active capability, file → names it owns.

use crate::adapter::CapabilityAdapter;
use crate::types::{CapabilityName, Epoch, FileIdentity, Hash};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Registry handle shared between the reload pipeline and readers
pub type SharedRegistry = Arc<RwLock<CapabilityRegistry>>;

/// A capability that is currently live.
#[derive(Debug, Clone)]
pub struct RegisteredCapability {
    pub name: CapabilityName,
    /// File name of the owning capability file
    pub owner: String,
    /// Loader epoch that produced this version
    pub epoch: Epoch,
    pub adapter: Arc<CapabilityAdapter>,
}

/// The names one file currently contributes.
#[derive(Debug, Clone)]
pub struct FileRegistration {
    pub file: FileIdentity,
    pub capability_names: BTreeSet<CapabilityName>,
    pub epoch: Epoch,
    pub digest: Hash,
}

/// What a `register_file` call changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryDelta {
    /// Names installed or replaced by this registration
    pub installed: Vec<CapabilityName>,
    /// Names the file owned before and no longer contributes
    pub retracted: Vec<CapabilityName>,
    /// Names taken over from another file: (name, previous owner)
    pub displaced: Vec<(CapabilityName, String)>,
}

/// Process-wide capability table.
///
/// Invariant: for every file, `FileRegistration::capability_names` equals the
/// set of live capabilities whose `owner` is that file, and no registration
/// is empty.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityName, RegisteredCapability>,
    files: HashMap<String, FileRegistration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry behind a shared handle
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Install every capability of a file, replacing same-named entries, and
    /// record the file's new name set.
    ///
    /// Names from another file are taken over (last registration wins). Names
    /// this file owned before but no longer lists are retracted.
    pub fn register_file(
        &mut self,
        file: &FileIdentity,
        epoch: Epoch,
        digest: Hash,
        capabilities: Vec<RegisteredCapability>,
    ) -> RegistryDelta {
        let mut delta = RegistryDelta::default();
        let new_names: BTreeSet<CapabilityName> =
            capabilities.iter().map(|c| c.name.clone()).collect();

        if let Some(previous) = self.files.remove(&file.file_name) {
            for name in previous.capability_names.difference(&new_names) {
                self.capabilities.remove(name);
                delta.retracted.push(name.clone());
            }
        }

        for mut capability in capabilities {
            capability.owner = file.file_name.clone();
            let name = capability.name.clone();
            if let Some(existing) = self.capabilities.get(&name) {
                if existing.owner != file.file_name {
                    let previous_owner = existing.owner.clone();
                    warn!(
                        capability = %name,
                        previous_owner = %previous_owner,
                        new_owner = %file.file_name,
                        "Capability name collision, last registration wins"
                    );
                    self.release_name(&previous_owner, &name);
                    delta.displaced.push((name.clone(), previous_owner));
                }
            }
            debug!(capability = %name, file = %file.file_name, epoch, "Registering capability");
            self.capabilities.insert(name.clone(), capability);
            delta.installed.push(name);
        }

        if !new_names.is_empty() {
            self.files.insert(
                file.file_name.clone(),
                FileRegistration {
                    file: file.clone(),
                    capability_names: new_names,
                    epoch,
                    digest,
                },
            );
        }

        delta
    }

    /// Remove every capability owned by a file and its registration entry.
    /// Unknown files are a no-op. Returns the removed names in order.
    pub fn unregister_file(&mut self, file_name: &str) -> Vec<CapabilityName> {
        let Some(registration) = self.files.remove(file_name) else {
            return Vec::new();
        };
        let mut removed = Vec::with_capacity(registration.capability_names.len());
        for name in registration.capability_names {
            if self.capabilities.remove(&name).is_some() {
                debug!(capability = %name, file = %file_name, "Unregistering capability");
                removed.push(name);
            }
        }
        removed
    }

    /// Drop a name from another file's registration after a takeover.
    fn release_name(&mut self, file_name: &str, name: &str) {
        let now_empty = match self.files.get_mut(file_name) {
            Some(registration) => {
                registration.capability_names.remove(name);
                registration.capability_names.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.files.remove(file_name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCapability> {
        self.capabilities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// All live capabilities sorted by name
    pub fn list(&self) -> Vec<&RegisteredCapability> {
        let mut all: Vec<_> = self.capabilities.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// All live capability names, sorted
    pub fn names(&self) -> Vec<CapabilityName> {
        self.list().into_iter().map(|c| c.name.clone()).collect()
    }

    pub fn file(&self, file_name: &str) -> Option<&FileRegistration> {
        self.files.get(file_name)
    }

    /// All file registrations sorted by file name
    pub fn files(&self) -> Vec<&FileRegistration> {
        let mut all: Vec<_> = self.files.values().collect();
        all.sort_by(|a, b| a.file.file_name.cmp(&b.file.file_name));
        all
    }

    /// Names whose live entry is owned by `file_name`, computed from the
    /// capability table rather than the registration.
    pub fn owned_by(&self, file_name: &str) -> BTreeSet<CapabilityName> {
        self.capabilities
            .values()
            .filter(|c| c.owner == file_name)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Remove everything; returns the names that were live.
    pub fn clear(&mut self) -> Vec<CapabilityName> {
        let names = self.names();
        self.capabilities.clear();
        self.files.clear();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Behavior, CapabilityDescriptor, TemplateSpec};
    use proptest::prelude::*;
    use std::path::Path;
    use std::time::Duration;

    fn identity(file_name: &str) -> FileIdentity {
        FileIdentity::from_path(Path::new(file_name)).unwrap()
    }

    fn capability(name: &str) -> RegisteredCapability {
        let descriptor = CapabilityDescriptor {
            description: format!("{} capability", name),
            input: None,
            behavior: Behavior::Template(TemplateSpec {
                template: name.to_string(),
            }),
        };
        RegisteredCapability {
            name: name.to_string(),
            owner: String::new(),
            epoch: 1,
            adapter: Arc::new(CapabilityAdapter::new(
                name,
                Arc::new(descriptor),
                Duration::from_secs(1),
            )),
        }
    }

    fn assert_ownership_invariant(registry: &CapabilityRegistry) {
        for registration in registry.files() {
            assert!(!registration.capability_names.is_empty());
            assert_eq!(
                registration.capability_names,
                registry.owned_by(&registration.file.file_name)
            );
        }
        for capability in registry.list() {
            let registration = registry
                .file(&capability.owner)
                .expect("every live capability has an owning registration");
            assert!(registration.capability_names.contains(&capability.name));
        }
    }

    #[test]
    fn test_register_and_unregister_file() {
        let mut registry = CapabilityRegistry::new();
        let math = identity("math.toml");
        let delta = registry.register_file(
            &math,
            1,
            [0u8; 32],
            vec![capability("math_add"), capability("math_multiply")],
        );
        assert_eq!(delta.installed, vec!["math_add", "math_multiply"]);
        assert!(registry.contains("math_add"));
        assert_eq!(registry.get("math_add").unwrap().owner, "math.toml");
        assert_eq!(registry.file("math.toml").unwrap().capability_names.len(), 2);

        let removed = registry.unregister_file("math.toml");
        assert_eq!(removed, vec!["math_add", "math_multiply"]);
        assert!(registry.is_empty());
        assert!(registry.file("math.toml").is_none());
        assert!(registry.unregister_file("math.toml").is_empty());
    }

    #[test]
    fn test_reregister_retracts_dropped_names() {
        let mut registry = CapabilityRegistry::new();
        let math = identity("math.toml");
        registry.register_file(
            &math,
            1,
            [0u8; 32],
            vec![capability("math_add"), capability("math_multiply")],
        );
        let delta = registry.register_file(
            &math,
            2,
            [1u8; 32],
            vec![capability("math_add"), capability("math_subtract")],
        );

        assert_eq!(delta.retracted, vec!["math_multiply"]);
        assert_eq!(registry.names(), vec!["math_add", "math_subtract"]);
        assert_eq!(registry.file("math.toml").unwrap().epoch, 2);
        assert_ownership_invariant(&registry);
    }

    #[test]
    fn test_empty_registration_leaves_no_entry() {
        let mut registry = CapabilityRegistry::new();
        let empty = identity("empty.toml");
        let delta = registry.register_file(&empty, 1, [0u8; 32], Vec::new());
        assert!(delta.installed.is_empty());
        assert!(registry.file("empty.toml").is_none());
    }

    #[test]
    fn test_collision_last_registration_wins() {
        let mut registry = CapabilityRegistry::new();
        registry.register_file(
            &identity("a.toml"),
            1,
            [0u8; 32],
            vec![capability("shared"), capability("a_only")],
        );
        let delta =
            registry.register_file(&identity("b.json"), 2, [0u8; 32], vec![capability("shared")]);

        assert_eq!(delta.displaced, vec![("shared".to_string(), "a.toml".to_string())]);
        assert_eq!(registry.get("shared").unwrap().owner, "b.json");
        assert_ownership_invariant(&registry);

        // Retracting the loser must not take the winner's capability with it
        let removed = registry.unregister_file("a.toml");
        assert_eq!(removed, vec!["a_only"]);
        assert!(registry.contains("shared"));
    }

    #[test]
    fn test_clear() {
        let mut registry = CapabilityRegistry::new();
        registry.register_file(&identity("a.toml"), 1, [0u8; 32], vec![capability("a")]);
        assert_eq!(registry.clear(), vec!["a"]);
        assert!(registry.is_empty());
        assert!(registry.files().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(usize, Vec<usize>),
        Unregister(usize),
    }

    const FILES: &[&str] = &["a.toml", "b.toml", "c.json"];
    const NAMES: &[&str] = &["x", "y", "z", "w"];

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..FILES.len(), proptest::collection::vec(0..NAMES.len(), 0..4))
                .prop_map(|(f, names)| Op::Register(f, names)),
            (0..FILES.len()).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn prop_ownership_invariant_holds(ops in proptest::collection::vec(op_strategy(), 1..40)) {
            let mut registry = CapabilityRegistry::new();
            for (epoch, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Register(f, names) => {
                        let mut unique: Vec<usize> = names;
                        unique.sort();
                        unique.dedup();
                        let caps = unique.into_iter().map(|n| capability(NAMES[n])).collect();
                        registry.register_file(&identity(FILES[f]), epoch as u64, [0u8; 32], caps);
                    }
                    Op::Unregister(f) => {
                        registry.unregister_file(FILES[f]);
                        prop_assert!(registry.file(FILES[f]).is_none());
                        prop_assert!(registry.owned_by(FILES[f]).is_empty());
                    }
                }
                assert_ownership_invariant(&registry);
            }
        }
    }
}
