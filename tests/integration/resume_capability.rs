//! Integration tests for resuming interrupted and repeated runs

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::support::{words, ScriptedConnector};
use dict_builder::orchestrator::{
    BatchOrchestrator, FailureReason, OrchestratorConfig, OrchestratorError, Outcome, Payload,
    StopReason,
};
use dict_builder::resume::{ProgressState, ProgressStore, SCHEMA_VERSION};
use dict_builder::shutdown::StopSignal;
use dict_builder::word::Key;

fn config(batch_size: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size,
        concurrency: 4,
        inter_batch_delay: Duration::ZERO,
        fetch_timeout: Duration::from_secs(1),
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn test_interrupted_run_resumes_without_refetching() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let items = words(50);

    let stop = StopSignal::shared();
    let first = Arc::new(ScriptedConnector::new().stopping_on("word0003", stop.clone()));
    let report = BatchOrchestrator::new(first.clone())
        .with_config(config(10))
        .with_store(store.clone())
        .with_stop(stop)
        .run(&items, store.load().unwrap())
        .await
        .unwrap();

    // The batch in flight when the stop arrived still completes
    assert_eq!(report.stop_reason, StopReason::ShutdownRequested);
    assert_eq!(report.summary.batches, 1);
    assert_eq!(store.load().unwrap().processed().len(), 10);

    let second = Arc::new(ScriptedConnector::new());
    let report = BatchOrchestrator::new(second.clone())
        .with_config(config(10))
        .with_store(store.clone())
        .run(&items, store.load().unwrap())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.summary.processed, 40);
    assert_eq!(report.state.succeeded().len(), 50);
    for item in &items[..10] {
        assert_eq!(second.calls(item.key.as_str()), 0);
    }
    for item in &items[10..] {
        assert_eq!(first.calls(item.key.as_str()), 0);
        assert_eq!(second.calls(item.key.as_str()), 1);
    }
}

#[tokio::test]
async fn test_rerun_only_retries_problematic_words() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let items = words(20);

    let first = Arc::new(
        ScriptedConnector::new()
            .failing("word0005", FailureReason::NoData)
            .failing("word0015", FailureReason::TransportError),
    );
    BatchOrchestrator::new(first)
        .with_config(config(10))
        .with_store(store.clone())
        .run(&items, store.load().unwrap())
        .await
        .unwrap();

    let second = Arc::new(ScriptedConnector::new());
    let orchestrator = BatchOrchestrator::new(second.clone())
        .with_config(config(10))
        .with_store(store.clone());
    let state = store.load().unwrap();

    let pending = orchestrator.pending(&items, &state);
    let keys: Vec<&str> = pending.iter().map(|i| i.key.as_str()).collect();
    assert_eq!(keys, vec!["word0005", "word0015"]);

    let report = orchestrator.run(&items, state).await.unwrap();
    assert_eq!(second.total_calls(), 2);
    assert!(report.state.problematic().is_empty());
    assert_eq!(report.state.succeeded().len(), 20);
}

#[tokio::test]
async fn test_skip_problematic_leaves_failures_alone() {
    let items = words(4);
    let mut prior = ProgressState::new();
    prior.record(&Key::new("word0001"), Outcome::Failure(FailureReason::NoData));

    let connector = Arc::new(ScriptedConnector::new());
    let mut cfg = config(10);
    cfg.retry_problematic = false;

    let report = BatchOrchestrator::new(connector.clone())
        .with_config(cfg)
        .run(&items, prior)
        .await
        .unwrap();

    assert_eq!(connector.calls("word0001"), 0);
    assert_eq!(report.summary.processed, 3);
    assert!(report.state.problematic().contains(&Key::new("word0001")));
}

#[test]
fn test_legacy_progress_file_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("progress.json");
    std::fs::write(
        &path,
        r#"{
            "translations": {"casa": "집", "hablar": "말하다"},
            "examples": {"hablar": ["hablar claro"]},
            "processed_words": ["casa", "hablar", "xyz"],
            "problematic_words": ["xyz"],
            "results_count": 2
        }"#,
    )
    .unwrap();

    let store = ProgressStore::new(&path);
    let mut state = store.load().unwrap();
    assert_eq!(state.succeeded().len(), 2);
    assert_eq!(state.succeeded()[&Key::new("casa")], Payload::text("집"));
    assert_eq!(state.succeeded()[&Key::new("hablar")].examples, vec!["hablar claro"]);
    assert!(state.problematic().contains(&Key::new("xyz")));

    state.mark_checkpoint();
    store.save(&state).unwrap();
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved["schema_version"], SCHEMA_VERSION);
    assert_eq!(saved["translations"]["casa"], "집");
    assert_eq!(saved["translations"]["hablar"]["examples"][0], "hablar claro");
}

#[tokio::test]
async fn test_failed_checkpoint_aborts_before_next_batch() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let store = ProgressStore::new(blocker.join("progress.json"));

    let connector = Arc::new(ScriptedConnector::new());
    let result = BatchOrchestrator::new(connector.clone())
        .with_config(config(2))
        .with_store(store)
        .run(&words(6), ProgressState::new())
        .await;

    assert!(matches!(result, Err(OrchestratorError::Checkpoint(_))));
    assert_eq!(connector.total_calls(), 2);
}

#[test]
fn test_saved_file_never_partial() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));

    let mut state = ProgressState::new();
    for i in 0..500 {
        state.record(&Key::new(format!("word{i}")), Outcome::text("뜻"));
        if i % 100 == 99 {
            state.mark_checkpoint();
            store.save(&state).unwrap();
            let on_disk = store.verify().unwrap();
            assert_eq!(on_disk.processed().len(), i + 1);
        }
    }

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "progress.json" && name != "progress.json.lock")
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}
