use tooldeck::tooling::cli::{CliContext, Commands};

use super::support::demos_workspace;

#[tokio::test]
async fn demo_directory_loads_cleanly() {
    let cli = CliContext::new(demos_workspace(), None).unwrap();
    let output = cli
        .execute(&Commands::Check {
            file: None,
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["failed"], serde_json::json!(0));

    let output = cli
        .execute(&Commands::List {
            format: "json".to_string(),
        })
        .await
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    let names: Vec<&str> = parsed["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["clock", "greet", "math_add", "math_multiply"]);
}

#[tokio::test]
async fn demo_greet_renders_template() {
    let cli = CliContext::new(demos_workspace(), None).unwrap();
    let output = cli
        .execute(&Commands::Call {
            name: "greet".to_string(),
            args: Some(r#"{"name": "Ada"}"#.to_string()),
        })
        .await
        .unwrap();
    assert_eq!(output, "Hello, Ada! Welcome to tooldeck.");
}

#[cfg(unix)]
#[tokio::test]
async fn demo_math_runs_commands() {
    let cli = CliContext::new(demos_workspace(), None).unwrap();
    let output = cli
        .execute(&Commands::Call {
            name: "math_multiply".to_string(),
            args: Some(r#"{"a": 6, "b": 7}"#.to_string()),
        })
        .await
        .unwrap();
    assert_eq!(output, "42");
}
