//! Watch configuration, event eligibility, and the pending change set.

use crate::capability::{has_recognized_extension, recognized_extensions, DEFAULT_EXTENSIONS};
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Watch mode configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Capability directory (watched non-recursively)
    pub root: PathBuf,
    /// Quiescence window in milliseconds
    pub debounce_ms: u64,
    /// Recognized capability-source extensions
    pub extensions: Vec<String>,
    /// Glob patterns matched against file names
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("capabilities"),
            debounce_ms: 100,
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Editor swap, backup and scratch files
pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        "*.swp".to_string(),
        "*.swx".to_string(),
        "*~".to_string(),
        ".#*".to_string(),
        "*.tmp".to_string(),
        ".DS_Store".to_string(),
    ]
}

/// Decides which filesystem paths may trigger a reload.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    extensions: Vec<String>,
    ignore_patterns: Vec<Pattern>,
}

impl ChangeFilter {
    pub fn new(config: &WatchConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|raw| match compile_ignore_pattern(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %raw, error = %e, "Skipping invalid ignore pattern");
                    None
                }
            })
            .collect();
        Self {
            root: config.root.clone(),
            extensions: recognized_extensions(&config.extensions),
            ignore_patterns,
        }
    }

    /// Replace the directory events are compared against
    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = root;
        self
    }

    /// A path is eligible when it sits directly in the root, carries a
    /// recognized extension, and matches no ignore pattern.
    pub fn is_eligible(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if !has_recognized_extension(path, &self.extensions) || self.should_ignore(name) {
            return false;
        }
        match path.parent() {
            Some(parent) if parent == self.root => true,
            Some(parent) => dunce::canonicalize(parent)
                .map(|canonical| canonical == self.root)
                .unwrap_or(false),
            None => false,
        }
    }

    fn should_ignore(&self, name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| pattern.matches(name))
    }
}

/// Compile an ignore pattern. Patterns apply to file names only, so a
/// leading `**/` is dropped.
pub fn compile_ignore_pattern(raw: &str) -> Result<Pattern, glob::PatternError> {
    Pattern::new(raw.trim_start_matches("**/"))
}

/// File paths changed since the last drained batch.
#[derive(Debug, Default)]
pub struct PendingChangeSet {
    paths: BTreeSet<PathBuf>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; returns false if the path was already pending
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    /// Take every pending path, leaving the set empty
    pub fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
