//! Module loader: evaluates one capability file into descriptors.
//!
//! Every call reads the file from disk and is stamped with a fresh loader
//! epoch. Nothing is cached between loads, so a reload always reflects the
//! file's content at the moment it is read.

use super::descriptor::{descriptor_from_export, is_capability_descriptor, CapabilityDescriptor};
use crate::error::LoadError;
use crate::types::{Epoch, ExportName, Hash};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Extensions recognized when no configuration says otherwise
pub const DEFAULT_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Result of loading one file.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The file does not exist (deleted between event and load)
    NotFound,
    /// The file exists but could not be evaluated
    Failed(LoadError),
    /// The file evaluated; zero or more exports were accepted
    Loaded(LoadedModule),
}

/// A freshly evaluated capability file.
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub epoch: Epoch,
    /// blake3 digest of the bytes that were evaluated
    pub digest: Hash,
    /// Accepted exports in key order
    pub exports: Vec<(ExportName, CapabilityDescriptor)>,
    /// Export keys that were not capability descriptors
    pub skipped: Vec<String>,
}

/// Source format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Toml,
    Json,
    Yaml,
}

impl SourceFormat {
    fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "toml" => Some(SourceFormat::Toml),
            "json" => Some(SourceFormat::Json),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            _ => None,
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension()?.to_str()?)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

/// Whether an extension (with or without its dot) names a format the
/// loader can parse.
pub fn is_supported_extension(ext: &str) -> bool {
    SourceFormat::from_extension(ext).is_some()
}

/// Normalize configured extensions, keeping only parseable ones.
pub fn recognized_extensions(configured: &[String]) -> Vec<String> {
    configured
        .iter()
        .filter(|ext| is_supported_extension(ext))
        .map(|ext| normalize_extension(ext))
        .collect()
}

/// Whether `path` carries one of `extensions` (as returned by
/// [`recognized_extensions`]).
pub fn has_recognized_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = normalize_extension(ext);
            extensions.iter().any(|known| *known == ext)
        })
        .unwrap_or(false)
}

/// Loads capability files, one fresh evaluation per call.
pub struct ModuleLoader {
    epoch: AtomicU64,
    extensions: Vec<String>,
}

impl ModuleLoader {
    /// Create a loader recognizing the given extensions (without dots).
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            extensions: recognized_extensions(&extensions),
        }
    }

    /// Whether a path carries a recognized capability-source extension
    pub fn is_recognized(&self, path: &Path) -> bool {
        has_recognized_extension(path, &self.extensions)
    }

    /// Epoch of the most recent load (0 before the first load)
    pub fn current_epoch(&self) -> Epoch {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Load a file fresh from disk.
    pub async fn load(&self, path: &Path) -> LoadOutcome {
        if !self.is_recognized(path) {
            return LoadOutcome::Failed(LoadError::UnsupportedExtension(path.to_path_buf()));
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LoadOutcome::NotFound,
            Err(source) => {
                return LoadOutcome::Failed(LoadError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match evaluate(path, epoch, &bytes) {
            Ok(module) => LoadOutcome::Loaded(module),
            Err(e) => LoadOutcome::Failed(e),
        }
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect())
    }
}

/// Parse file bytes and extract every accepted export.
fn evaluate(path: &Path, epoch: Epoch, bytes: &[u8]) -> Result<LoadedModule, LoadError> {
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| LoadError::UnsupportedExtension(path.to_path_buf()))?;
    let parse_error = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let text = std::str::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;

    let document: Value = match format {
        SourceFormat::Toml => {
            let table: toml::Table =
                toml::from_str(text).map_err(|e| parse_error(e.to_string()))?;
            serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))?
        }
        SourceFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string()))?,
        SourceFormat::Yaml => {
            // A YAML document with no content (blank, comments only, `---`,
            // `~`) is an empty module, not an error
            let document = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string()))?
            };
            match document {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        }
    };

    let Value::Object(entries) = document else {
        return Err(LoadError::NotATable {
            path: path.to_path_buf(),
        });
    };

    let mut exports = Vec::new();
    let mut skipped = Vec::new();
    for (key, value) in &entries {
        let export = ExportName::from_key(key);
        if !is_capability_descriptor(value) {
            debug!(path = %path.display(), export = %key, "Skipping non-capability export");
            skipped.push(key.clone());
            continue;
        }
        exports.push((export.clone(), descriptor_from_export(path, &export, value)?));
    }

    Ok(LoadedModule {
        path: path.to_path_buf(),
        epoch,
        digest: *blake3::hash(bytes).as_bytes(),
        exports,
        skipped,
    })
}
