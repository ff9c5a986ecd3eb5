use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tooldeck::config::DeckConfig;
use tooldeck::{CapabilityHost, MemorySink, ReloadOutcome};

use super::support::{eventually, workspace, write, MATH_V1, MATH_V2};

const WAIT: Duration = Duration::from_secs(10);

fn config() -> DeckConfig {
    let mut config = DeckConfig::default();
    config.watch.debounce_ms = 100;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edit_swaps_exports_after_debounce() {
    let (ws, caps) = workspace();
    let math = write(&caps, "math.toml", MATH_V1);
    let sink = Arc::new(MemorySink::new());
    let mut host = CapabilityHost::new(config(), ws.path(), sink.clone());
    host.initial_scan().await.unwrap();
    assert_eq!(host.registry().read().names(), vec!["math_add", "math_multiply"]);

    let (tx, mut batches) = mpsc::unbounded_channel();
    assert!(host.start_watching(Some(tx)));
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(&math, MATH_V2).unwrap();
    let registry = Arc::clone(host.registry());
    assert!(
        eventually(WAIT, || {
            let registry = Arc::clone(&registry);
            async move { registry.read().names() == vec!["math_add", "math_subtract"] }
        })
        .await,
        "registry never picked up the edit"
    );
    assert!(!registry.read().contains("math_multiply"));
    assert_eq!(sink.names(), vec!["math_add", "math_subtract"]);

    let report = tokio::time::timeout(WAIT, batches.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(report.outcomes.iter().all(ReloadOutcome::is_active));
    assert!(sink.notification_count() >= 1);

    host.shutdown().await;
    assert!(registry.read().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_and_delete_are_picked_up() {
    let (ws, caps) = workspace();
    let sink = Arc::new(MemorySink::new());
    let mut host = CapabilityHost::new(config(), ws.path(), sink.clone());
    host.initial_scan().await.unwrap();
    assert!(host.start_watching(None));
    tokio::time::sleep(Duration::from_millis(200)).await;

    let greet = write(
        &caps,
        "greet.json",
        r#"{"default": {"description": "Greet", "execute": {"template": "hi"}}}"#,
    );
    let registry = Arc::clone(host.registry());
    assert!(
        eventually(WAIT, || {
            let registry = Arc::clone(&registry);
            async move { registry.read().contains("greet") }
        })
        .await
    );

    std::fs::remove_file(&greet).unwrap();
    assert!(
        eventually(WAIT, || {
            let registry = Arc::clone(&registry);
            async move { registry.read().is_empty() }
        })
        .await
    );
    assert!(sink.names().is_empty());
    assert!(registry.read().file("greet.json").is_none());

    host.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broken_edit_isolated_to_its_file() {
    let (ws, caps) = workspace();
    let math = write(&caps, "math.toml", MATH_V1);
    write(
        &caps,
        "greet.yaml",
        "default:\n  description: Greet\n  execute:\n    template: hi\n",
    );
    let sink = Arc::new(MemorySink::new());
    let mut host = CapabilityHost::new(config(), ws.path(), sink.clone());
    host.initial_scan().await.unwrap();
    assert!(host.start_watching(None));
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(&math, "[add\nbroken = ").unwrap();
    let registry = Arc::clone(host.registry());
    assert!(
        eventually(WAIT, || {
            let registry = Arc::clone(&registry);
            async move { registry.read().names() == vec!["greet"] }
        })
        .await
    );

    std::fs::write(&math, MATH_V1).unwrap();
    assert!(
        eventually(WAIT, || {
            let registry = Arc::clone(&registry);
            async move { registry.read().len() == 3 }
        })
        .await
    );

    host.shutdown().await;
}

#[tokio::test]
async fn no_watch_loads_once() {
    let (ws, caps) = workspace();
    write(&caps, "math.toml", MATH_V1);
    let mut config = config();
    config.no_watch = true;

    let host = CapabilityHost::start(config, ws.path(), Arc::new(MemorySink::new()))
        .await
        .unwrap();
    assert!(!host.is_watching());
    assert_eq!(host.registry().read().len(), 2);
    host.shutdown().await;
}
