//! Capability descriptors and the structural check applied to raw exports.

use super::schema::InputShape;
use crate::error::LoadError;
use crate::types::ExportName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One capability exported by a file.
#[derive(Debug)]
pub struct CapabilityDescriptor {
    /// Human-readable description shown to clients
    pub description: String,
    /// Optional input schema; `None` means the capability takes no arguments
    pub input: Option<InputShape>,
    /// What running the capability does
    pub behavior: Behavior,
}

/// Executable behavior of a capability.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Run an external program with the arguments on stdin
    Command(CommandSpec),
    /// Render a string template against the arguments
    Template(TemplateSpec),
}

/// How command stdout is turned into a result value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

/// `execute.command` behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Per-call timeout override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub output: OutputMode,
    /// Extra environment for the child process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Directory the command runs in (the capability file's directory)
    #[serde(skip)]
    pub working_dir: Option<PathBuf>,
}

/// `execute.template` behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    pub template: String,
}

/// Structural check for a raw export.
///
/// A value qualifies when it is a map with a string `description` and an
/// `execute` map naming exactly one behavior: a non-empty string array
/// `command`, or a string `template`.
pub fn is_capability_descriptor(value: &Value) -> bool {
    let Some(map) = value.as_object() else {
        return false;
    };
    if !map.get("description").map_or(false, Value::is_string) {
        return false;
    }
    let Some(execute) = map.get("execute").and_then(Value::as_object) else {
        return false;
    };

    let command = execute.get("command").map(|c| {
        c.as_array()
            .map_or(false, |argv| !argv.is_empty() && argv.iter().all(Value::is_string))
    });
    let template = execute.get("template").map(Value::is_string);

    matches!(
        (command, template),
        (Some(true), None) | (None, Some(true))
    )
}

/// Build a descriptor from an export that passed `is_capability_descriptor`.
pub fn descriptor_from_export(
    path: &Path,
    export: &ExportName,
    value: &Value,
) -> Result<CapabilityDescriptor, LoadError> {
    let invalid = |message: String| LoadError::InvalidExport {
        path: path.to_path_buf(),
        export: export.to_string(),
        message,
    };

    let description = value
        .get("description")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing description".to_string()))?
        .to_string();
    let execute = value
        .get("execute")
        .cloned()
        .ok_or_else(|| invalid("missing execute".to_string()))?;

    let behavior = if execute.get("command").is_some() {
        let mut spec: CommandSpec =
            serde_json::from_value(execute).map_err(|e| invalid(e.to_string()))?;
        spec.working_dir = path.parent().map(Path::to_path_buf);
        Behavior::Command(spec)
    } else {
        let spec: TemplateSpec =
            serde_json::from_value(execute).map_err(|e| invalid(e.to_string()))?;
        Behavior::Template(spec)
    };

    let input = match value.get("input") {
        None | Some(Value::Null) => None,
        Some(raw) => Some(InputShape::compile(raw.clone()).map_err(|message| {
            LoadError::InvalidSchema {
                path: path.to_path_buf(),
                export: export.to_string(),
                message,
            }
        })?),
    };

    Ok(CapabilityDescriptor {
        description,
        input,
        behavior,
    })
}
