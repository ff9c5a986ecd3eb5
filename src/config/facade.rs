//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::DeckConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from files and environment, then validate it.
    pub fn load(workspace_root: &Path) -> Result<DeckConfig, ApiError> {
        let config = MergeService::load(workspace_root)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file (plus environment overlay).
    pub fn load_from_file(path: &Path) -> Result<DeckConfig, ApiError> {
        if !path.is_file() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Pick the explicit file when given, otherwise the layered workspace config.
    pub fn resolve(
        workspace_root: &Path,
        config_path: Option<&Path>,
    ) -> Result<DeckConfig, ApiError> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(workspace_root),
        }
    }
}
