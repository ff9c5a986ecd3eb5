//! Adapter between capability descriptors and the protocol calling convention.
//!
//! `CapabilityAdapter::call` takes raw arguments and an execution context and
//! always produces a `ResponseEnvelope`; validation errors, behavior errors and
//! panics inside a behavior all become failed envelopes.

use crate::capability::CapabilityDescriptor;
use crate::error::BehaviorError;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-call metadata supplied by the sink and passed through to behaviors.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Protocol request id, when the call came from a remote client
    pub request_id: Option<String>,
    /// Cancelled when the caller gives up on the call
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(request_id: Option<String>, cancellation: CancellationToken) -> Self {
        Self {
            request_id,
            cancellation,
        }
    }

    /// Context for calls that do not originate from a protocol request
    pub fn detached() -> Self {
        Self::new(None, CancellationToken::new())
    }
}

/// One content block of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Result of one capability invocation, in the shape the protocol expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

impl ResponseEnvelope {
    /// Successful response. Strings pass through verbatim, anything else is
    /// rendered as pretty-printed JSON.
    pub fn success(value: &Value) -> Self {
        let text = match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        Self {
            content: vec![Content::Text { text }],
            is_error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// All text content joined by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A capability wrapped into the sink's calling convention.
pub struct CapabilityAdapter {
    name: String,
    descriptor: Arc<CapabilityDescriptor>,
    default_timeout: Duration,
}

impl CapabilityAdapter {
    pub fn new(
        name: impl Into<String>,
        descriptor: Arc<CapabilityDescriptor>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            default_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    /// The declared input schema document, if any
    pub fn input_schema(&self) -> Option<&Value> {
        self.descriptor.input.as_ref().map(|shape| shape.raw())
    }

    /// Validate, invoke and serialize. Never fails and never panics.
    pub async fn call(
        &self,
        raw_arguments: Option<Value>,
        ctx: ExecutionContext,
    ) -> ResponseEnvelope {
        let arguments = match &self.descriptor.input {
            Some(shape) => {
                let raw = match raw_arguments {
                    None | Some(Value::Null) => Value::Object(Map::new()),
                    Some(value) => value,
                };
                match shape.parse(&raw) {
                    Ok(parsed) => parsed,
                    Err(errors) => {
                        debug!(
                            capability = %self.name,
                            request_id = ?ctx.request_id,
                            violations = errors.len(),
                            "Rejected invalid arguments"
                        );
                        return ResponseEnvelope::failure(format!(
                            "Invalid arguments for {}: {}",
                            self.name,
                            errors.join("; ")
                        ));
                    }
                }
            }
            None => Value::Object(Map::new()),
        };

        let invocation = self
            .descriptor
            .behavior
            .execute(&arguments, &ctx, self.default_timeout);
        let result = AssertUnwindSafe(invocation)
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(BehaviorError::Panicked(panic_message(payload.as_ref())))
            });
        self.envelope(result, &ctx)
    }

    fn envelope(
        &self,
        result: Result<Value, BehaviorError>,
        ctx: &ExecutionContext,
    ) -> ResponseEnvelope {
        match result {
            Ok(value) => {
                debug!(
                    capability = %self.name,
                    request_id = ?ctx.request_id,
                    "Capability completed"
                );
                ResponseEnvelope::success(&value)
            }
            Err(e) => {
                warn!(
                    capability = %self.name,
                    request_id = ?ctx.request_id,
                    error = %e,
                    "Capability failed"
                );
                ResponseEnvelope::failure(format!("Capability {} failed: {}", self.name, e))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl std::fmt::Debug for CapabilityAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityAdapter")
            .field("name", &self.name)
            .finish()
    }
}
