use clap::{CommandFactory, Parser};
use tooldeck::tooling::cli::{Cli, CliContext, Commands};
use tooldeck::ApiError;

use super::support::{workspace, write, MATH_V1};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["tooldeck", "serve"],
        vec!["tooldeck", "serve", "--no-watch"],
        vec!["tooldeck", "serve", "--debounce-ms", "250"],
        vec!["tooldeck", "list"],
        vec!["tooldeck", "list", "--format", "json"],
        vec!["tooldeck", "check"],
        vec!["tooldeck", "check", "capabilities/math.toml", "--format", "json"],
        vec!["tooldeck", "call", "math_add", "--args", "{\"a\":1,\"b\":2}"],
        vec!["tooldeck", "--workspace", "demos", "--log-level", "debug", "list"],
        vec!["tooldeck", "list", "--workspace", "demos"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_input() {
    assert!(Cli::try_parse_from(["tooldeck"]).is_err());
    assert!(Cli::try_parse_from(["tooldeck", "list", "--format", "xml"]).is_err());
    assert!(Cli::try_parse_from(["tooldeck", "call"]).is_err());
    assert!(Cli::try_parse_from(["tooldeck", "serve", "--debounce-ms", "soon"]).is_err());
}

#[test]
fn help_lists_every_command() {
    let mut command = Cli::command();
    let help = command.render_long_help().to_string();
    for token in ["serve", "list", "check", "call", "--workspace", "--config"] {
        assert!(help.contains(token), "help is missing {token}");
    }
}

#[tokio::test]
async fn list_json_contract_has_required_fields() {
    let (ws, caps) = workspace();
    write(&caps, "math.toml", MATH_V1);

    let cli = CliContext::new(ws.path().to_path_buf(), None).unwrap();
    let output = cli
        .execute(&Commands::List {
            format: "json".to_string(),
        })
        .await
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed.get("total").and_then(|v| v.as_u64()), Some(2));
    let capabilities = parsed.get("capabilities").and_then(|v| v.as_array()).unwrap();
    for capability in capabilities {
        assert!(capability.get("name").and_then(|v| v.as_str()).is_some());
        assert!(capability.get("file").and_then(|v| v.as_str()).is_some());
        assert!(capability.get("description").and_then(|v| v.as_str()).is_some());
        assert!(capability.get("input_schema").is_some());
    }
}

#[tokio::test]
async fn workspace_config_file_moves_the_directory() {
    let (ws, _caps) = workspace();
    let tools = ws.path().join("tools");
    std::fs::create_dir(&tools).unwrap();
    write(&tools, "math.toml", MATH_V1);
    write(ws.path(), "tooldeck.toml", "[capabilities]\ndir = \"tools\"\n");

    let cli = CliContext::new(ws.path().to_path_buf(), None).unwrap();
    assert_eq!(cli.config().capabilities.dir, std::path::PathBuf::from("tools"));
    let output = cli
        .execute(&Commands::List {
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["total"], serde_json::json!(2));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let (ws, _caps) = workspace();
    let result = CliContext::new(ws.path().to_path_buf(), Some(ws.path().join("absent.toml")));
    assert!(matches!(result, Err(ApiError::ConfigError(_))));
}

#[tokio::test]
async fn failed_invocation_is_an_error() {
    let (ws, caps) = workspace();
    write(&caps, "math.toml", MATH_V1);

    let cli = CliContext::new(ws.path().to_path_buf(), None).unwrap();
    // Without an input schema the template sees no arguments
    let err = cli
        .execute(&Commands::Call {
            name: "math_add".to_string(),
            args: Some("{\"a\":1,\"b\":2}".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvocationFailed(message) if message.contains("math_add")));
}
