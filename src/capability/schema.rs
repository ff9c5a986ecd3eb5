//! Input shape: an opaque validator compiled from a JSON Schema document.

use jsonschema::JSONSchema;
use serde_json::Value;

/// Compiled input schema attached to a capability.
pub struct InputShape {
    raw: Value,
    compiled: JSONSchema,
}

impl InputShape {
    /// Compile a JSON Schema document. The error carries the compiler's message.
    pub fn compile(raw: Value) -> Result<Self, String> {
        if !raw.is_object() {
            return Err("input schema must be an object".to_string());
        }
        let compiled = JSONSchema::compile(&raw).map_err(|e| e.to_string())?;
        Ok(Self { raw, compiled })
    }

    /// The schema document as declared in the capability file.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Validate caller-supplied arguments, returning the parsed input or every
    /// violation found.
    pub fn parse(&self, arguments: &Value) -> Result<Value, Vec<String>> {
        match self.compiled.validate(arguments) {
            Ok(()) => Ok(arguments.clone()),
            Err(errors) => Err(errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{}: {}", path, err)
                    }
                })
                .collect()),
        }
    }
}

impl std::fmt::Debug for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputShape").field("raw", &self.raw).finish()
    }
}
