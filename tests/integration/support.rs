use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

pub const MATH_V1: &str = r#"
[add]
description = "Add two numbers"
execute = { template = "{{a}} + {{b}}" }

[multiply]
description = "Multiply two numbers"
execute = { template = "{{a}} * {{b}}" }
"#;

pub const MATH_V2: &str = r#"
[add]
description = "Add two numbers"
execute = { template = "{{a}} + {{b}}" }

[subtract]
description = "Subtract two numbers"
execute = { template = "{{a}} - {{b}}" }
"#;

/// Workspace with an empty `capabilities/` directory
pub fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let caps = dir.path().join("capabilities");
    fs::create_dir(&caps).unwrap();
    (dir, caps)
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

pub fn demos_workspace() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos")
}
