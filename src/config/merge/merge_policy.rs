//! Built-in defaults, the lowest-precedence layer.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

/// Start a builder seeded with scalar defaults. List defaults come from serde.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("capabilities.dir", "capabilities")?
        .set_default("watch.enabled", true)?
        .set_default("watch.debounce_ms", 100)?
        .set_default("execution.timeout_ms", 30_000)?
        .set_default("no_watch", false)
}
