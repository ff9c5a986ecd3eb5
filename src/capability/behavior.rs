//! Behavior execution: external commands and string templates.

use super::descriptor::{Behavior, CommandSpec, OutputMode, TemplateSpec};
use crate::adapter::ExecutionContext;
use crate::error::BehaviorError;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

impl Behavior {
    /// Run the behavior against already-parsed arguments.
    ///
    /// `default_timeout` bounds command behaviors that do not set their own
    /// `timeout_ms`. Templates complete synchronously.
    pub async fn execute(
        &self,
        arguments: &Value,
        ctx: &ExecutionContext,
        default_timeout: Duration,
    ) -> Result<Value, BehaviorError> {
        match self {
            Behavior::Command(spec) => run_command(spec, arguments, ctx, default_timeout).await,
            Behavior::Template(spec) => render_template(spec, arguments).map(Value::String),
        }
    }
}

async fn run_command(
    spec: &CommandSpec,
    arguments: &Value,
    ctx: &ExecutionContext,
    default_timeout: Duration,
) -> Result<Value, BehaviorError> {
    let Some((program, rest)) = spec.command.split_first() else {
        return Err(BehaviorError::Spawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let mut command = Command::new(program);
    command
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }
    for (key, value) in &spec.env {
        command.env(key, value);
    }
    for (key, value) in argument_env(arguments) {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| BehaviorError::Spawn {
        program: program.clone(),
        source,
    })?;

    // Stdin is written from its own task: the child may fill stdout
    // before it reads any input.
    if let Some(mut stdin) = child.stdin.take() {
        let payload = arguments.to_string().into_bytes();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(&payload).await {
                debug!(error = %e, "Child closed stdin before reading arguments");
            }
        });
    }

    let timeout = spec
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(default_timeout);

    let output = tokio::select! {
        _ = ctx.cancellation.cancelled() => return Err(BehaviorError::Cancelled),
        res = tokio::time::timeout(timeout, child.wait_with_output()) => match res {
            Ok(output) => output?,
            Err(_) => return Err(BehaviorError::Timeout(timeout.as_millis() as u64)),
        },
    };

    if !output.status.success() {
        return Err(BehaviorError::NonZeroExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match spec.output {
        OutputMode::Text => Ok(Value::String(stdout)),
        OutputMode::Json => serde_json::from_str(&stdout)
            .map_err(|e| BehaviorError::InvalidOutput(e.to_string())),
    }
}

/// `ARG_<KEY>` variables for every top-level scalar argument.
fn argument_env(arguments: &Value) -> Vec<(String, String)> {
    let Some(map) = arguments.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            let name: String = key
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect();
            Some((format!("ARG_{}", name), rendered))
        })
        .collect()
}

/// Substitute `{{key}}` placeholders with argument values.
fn render_template(spec: &TemplateSpec, arguments: &Value) -> Result<String, BehaviorError> {
    let mut out = String::with_capacity(spec.template.len());
    let mut rest = spec.template.as_str();

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            // Unterminated placeholder is literal text
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let key = after[..end].trim();
        match arguments.get(key) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => return Err(BehaviorError::MissingArgument(key.to_string())),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn template(text: &str) -> TemplateSpec {
        TemplateSpec {
            template: text.to_string(),
        }
    }

    #[test]
    fn test_render_template_substitutes_values() {
        let rendered = render_template(
            &template("Hello, {{ name }}! You are {{age}}."),
            &json!({ "name": "Ada", "age": 36 }),
        )
        .unwrap();
        assert_eq!(rendered, "Hello, Ada! You are 36.");
    }

    #[test]
    fn test_render_template_missing_argument() {
        let err = render_template(&template("{{who}}"), &json!({})).unwrap_err();
        assert!(matches!(err, BehaviorError::MissingArgument(ref k) if k == "who"));
    }

    #[test]
    fn test_render_template_unterminated_is_literal() {
        let rendered = render_template(&template("a {{b"), &json!({})).unwrap();
        assert_eq!(rendered, "a {{b");
    }

    #[test]
    fn test_argument_env_skips_structured_values() {
        let mut env: BTreeMap<String, String> = argument_env(&json!({
            "a": 2,
            "dry-run": true,
            "name": "x",
            "nested": { "k": 1 },
            "list": [1]
        }))
        .into_iter()
        .collect();
        assert_eq!(env.remove("ARG_A").as_deref(), Some("2"));
        assert_eq!(env.remove("ARG_DRY_RUN").as_deref(), Some("true"));
        assert_eq!(env.remove("ARG_NAME").as_deref(), Some("x"));
        assert!(env.is_empty());
    }

    #[cfg(unix)]
    fn command(argv: &[&str], output: OutputMode) -> Behavior {
        Behavior::Command(CommandSpec {
            command: argv.iter().map(|s| s.to_string()).collect(),
            timeout_ms: None,
            output,
            env: BTreeMap::new(),
            working_dir: None,
        })
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_reads_env_and_stdin() {
        let ctx = ExecutionContext::detached();
        let add = command(&["sh", "-c", "echo $((ARG_A + ARG_B))"], OutputMode::Text);
        let value = add
            .execute(&json!({ "a": 2, "b": 3 }), &ctx, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value, json!("5"));

        let echo = command(&["cat"], OutputMode::Json);
        let value = echo
            .execute(&json!({ "k": [1, 2] }), &ctx, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value, json!({ "k": [1, 2] }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failures() {
        let ctx = ExecutionContext::detached();
        let failing = command(&["sh", "-c", "echo boom >&2; exit 3"], OutputMode::Text);
        let err = failing
            .execute(&json!({}), &ctx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BehaviorError::NonZeroExit { code: Some(3), ref stderr } if stderr == "boom"
        ));

        let slow = command(&["sleep", "5"], OutputMode::Text);
        let err = slow
            .execute(&json!({}), &ctx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, BehaviorError::Timeout(50)));

        let missing = command(&["definitely-not-a-real-program-xyz"], OutputMode::Text);
        let err = missing
            .execute(&json!({}), &ctx, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BehaviorError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_observes_cancellation() {
        let ctx = ExecutionContext::detached();
        ctx.cancellation.cancel();
        let slow = command(&["sleep", "5"], OutputMode::Text);
        let err = slow
            .execute(&json!({}), &ctx, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BehaviorError::Cancelled));
    }
}
