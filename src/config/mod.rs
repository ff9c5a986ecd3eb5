//! Configuration
//!
//! Layered configuration for tooldeck: built-in defaults, the global config
//! file, the workspace `tooldeck.toml`, and `TOOLDECK_*` environment variables.

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

use crate::capability::{is_supported_extension, DEFAULT_EXTENSIONS};
use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::watch::{compile_ignore_pattern, default_ignore_patterns, WatchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workspace config file name
pub const WORKSPACE_CONFIG_FILE: &str = "tooldeck.toml";

fn default_capabilities_dir() -> PathBuf {
    PathBuf::from("capabilities")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Where capability files live and which of them are recognized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    /// Capability directory (relative to the workspace root)
    #[serde(default = "default_capabilities_dir")]
    pub dir: PathBuf,

    /// Recognized file extensions
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            dir: default_capabilities_dir(),
            extensions: default_extensions(),
        }
    }
}

/// Hot reload settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiescence window before a batch is processed
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Capability execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Default command timeout, used when a capability sets none
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Fully merged tooldeck configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckConfig {
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    #[serde(default)]
    pub watch: WatchSettings,

    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Disable hot reload regardless of `watch.enabled` (`TOOLDECK_NO_WATCH`)
    #[serde(default)]
    pub no_watch: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DeckConfig {
    /// Whether the host should start watching after the initial scan
    pub fn watch_enabled(&self) -> bool {
        self.watch.enabled && !self.no_watch
    }

    /// Capability directory resolved against the workspace root
    pub fn capabilities_dir(&self, workspace_root: &Path) -> PathBuf {
        if self.capabilities.dir.is_absolute() {
            self.capabilities.dir.clone()
        } else {
            workspace_root.join(&self.capabilities.dir)
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.timeout_ms)
    }

    /// Watch configuration for the scheduler
    pub fn watch_config(&self, workspace_root: &Path) -> WatchConfig {
        WatchConfig {
            root: self.capabilities_dir(workspace_root),
            debounce_ms: self.watch.debounce_ms,
            extensions: self.capabilities.extensions.clone(),
            ignore_patterns: self.watch.ignore_patterns.clone(),
        }
    }

    /// Reject values that would make the host unusable
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.capabilities.extensions.is_empty() {
            return Err(ApiError::ConfigError(
                "capabilities.extensions must name at least one extension".to_string(),
            ));
        }
        if let Some(ext) = self
            .capabilities
            .extensions
            .iter()
            .find(|ext| !is_supported_extension(ext))
        {
            return Err(ApiError::ConfigError(format!(
                "unsupported capability extension '{}' (expected toml, json, yaml or yml)",
                ext
            )));
        }
        for pattern in &self.watch.ignore_patterns {
            compile_ignore_pattern(pattern).map_err(|e| {
                ApiError::ConfigError(format!(
                    "watch.ignore_patterns: invalid pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }
        if self.watch.debounce_ms == 0 {
            return Err(ApiError::ConfigError(
                "watch.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.execution.timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "execution.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeckConfig::default();
        assert_eq!(config.capabilities.dir, PathBuf::from("capabilities"));
        assert_eq!(config.capabilities.extensions, vec!["toml", "json", "yaml", "yml"]);
        assert_eq!(config.watch.debounce_ms, 100);
        assert_eq!(config.execution.timeout_ms, 30_000);
        assert!(config.watch_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_watch_overrides_watch_enabled() {
        let config = DeckConfig {
            no_watch: true,
            ..DeckConfig::default()
        };
        assert!(!config.watch_enabled());
    }

    #[test]
    fn test_capabilities_dir_resolution() {
        let mut config = DeckConfig::default();
        assert_eq!(
            config.capabilities_dir(Path::new("/srv/ws")),
            PathBuf::from("/srv/ws/capabilities")
        );
        config.capabilities.dir = PathBuf::from("/opt/caps");
        assert_eq!(
            config.capabilities_dir(Path::new("/srv/ws")),
            PathBuf::from("/opt/caps")
        );
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        let mut config = DeckConfig::default();
        config.watch.debounce_ms = 0;
        assert!(matches!(config.validate(), Err(ApiError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_unparseable_extension() {
        let mut config = DeckConfig::default();
        config.capabilities.extensions = vec!["toml".to_string(), "ini".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'ini'"));

        config.capabilities.extensions = vec![".TOML".to_string(), "yml".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ignore_pattern() {
        let mut config = DeckConfig::default();
        config.watch.ignore_patterns = vec!["*.bak".to_string(), "[".to_string()];
        assert!(matches!(config.validate(), Err(ApiError::ConfigError(_))));
    }
}
