//! Core identifiers shared across the capability host.

use std::path::Path;

/// Name a capability is exposed under, e.g. `math_add`.
pub type CapabilityName = String;

/// Monotonic loader epoch stamped on every fresh evaluation of a file.
pub type Epoch = u64;

/// Hash: blake3 digest of a capability file's content
pub type Hash = [u8; 32];

/// Identity of one capability file inside the watched directory.
///
/// Registrations are keyed by `file_name`; capability names are derived
/// from `base` (the file name without its extension).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity {
    pub file_name: String,
    pub base: String,
}

impl FileIdentity {
    /// Build an identity from a path. Returns `None` for paths without a
    /// UTF-8 file name or stem.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let base = path.file_stem()?.to_str()?.to_string();
        if base.is_empty() {
            return None;
        }
        Some(Self { file_name, base })
    }

    /// Name for an export of this file: the bare base for the default
    /// export, `<base>_<export>` otherwise.
    pub fn capability_name(&self, export: &ExportName) -> CapabilityName {
        match export {
            ExportName::Default => self.base.clone(),
            ExportName::Named(name) => format!("{}_{}", self.base, name),
        }
    }
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Which export of a file a descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportName {
    Default,
    Named(String),
}

impl ExportName {
    pub const DEFAULT_KEY: &'static str = "default";

    pub fn from_key(key: &str) -> Self {
        if key == Self::DEFAULT_KEY {
            ExportName::Default
        } else {
            ExportName::Named(key.to_string())
        }
    }
}

impl std::fmt::Display for ExportName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportName::Default => f.write_str(Self::DEFAULT_KEY),
            ExportName::Named(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_identity_from_path() {
        let id = FileIdentity::from_path(&PathBuf::from("/tmp/caps/math.toml")).unwrap();
        assert_eq!(id.file_name, "math.toml");
        assert_eq!(id.base, "math");
    }

    #[test]
    fn test_capability_name_derivation() {
        let id = FileIdentity::from_path(&PathBuf::from("math.toml")).unwrap();
        assert_eq!(id.capability_name(&ExportName::Default), "math");
        assert_eq!(
            id.capability_name(&ExportName::from_key("add")),
            "math_add"
        );
        assert_eq!(ExportName::from_key("default"), ExportName::Default);
    }
}
