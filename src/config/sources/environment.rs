//! Environment variable source: TOOLDECK_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// Uses TOOLDECK_ prefix and __ as separator for nested keys.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(environment()))
}

/// The `TOOLDECK_` environment source. List-valued keys are comma separated.
pub fn environment() -> Environment {
    Environment::with_prefix("TOOLDECK")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("capabilities.extensions")
        .with_list_parse_key("watch.ignore_patterns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merge::merge_policy;
    use crate::config::DeckConfig;

    fn load_with(vars: &[(&str, &str)]) -> DeckConfig {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        merge_policy::builder_with_defaults()
            .unwrap()
            .add_source(environment().source(Some(source)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_no_watch_toggle() {
        let config = load_with(&[("TOOLDECK_NO_WATCH", "true")]);
        assert!(config.no_watch);
        assert!(!config.watch_enabled());
    }

    #[test]
    fn test_nested_keys_and_lists() {
        let config = load_with(&[
            ("TOOLDECK_WATCH__DEBOUNCE_MS", "40"),
            ("TOOLDECK_CAPABILITIES__EXTENSIONS", "toml,json"),
        ]);
        assert_eq!(config.watch.debounce_ms, 40);
        assert_eq!(config.capabilities.extensions, vec!["toml", "json"]);
    }
}
