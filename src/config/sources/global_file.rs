//! Global config file: `<platform config dir>/tooldeck/config.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::PathBuf;

/// Location of the global config file, if the platform has a config dir.
pub fn path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "tooldeck", "tooldeck")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global config file (optional) to the builder.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(match path() {
        Some(path) => {
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        None => builder,
    })
}
