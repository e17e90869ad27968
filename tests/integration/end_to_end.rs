//! End-to-end orchestration runs against a scripted connector

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::support::{words, ScriptedConnector};
use dict_builder::orchestrator::{
    BatchOrchestrator, FailureReason, OrchestratorConfig, Payload, StopReason,
};
use dict_builder::output::{collect_entries, write_problematic_report, ResultSink, YomitanSink};
use dict_builder::resume::{ProgressState, ProgressStore};
use dict_builder::word::{parse_word_list, Key, WorkItem};

fn config(batch_size: usize, concurrency: usize) -> OrchestratorConfig {
    OrchestratorConfig {
        batch_size,
        concurrency,
        inter_batch_delay: Duration::ZERO,
        fetch_timeout: Duration::from_secs(1),
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn test_small_word_list_scenario() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let items = parse_word_list("casa|n\nxyz123\n#comment\nagua|n\n");
    assert_eq!(items.len(), 3);

    let connector = Arc::new(
        ScriptedConnector::new()
            .translating("casa", "집")
            .translating("agua", "물")
            .failing("xyz123", FailureReason::NoData),
    );

    let report = BatchOrchestrator::new(connector)
        .with_config(config(10, 3))
        .with_store(store.clone())
        .run(&items, store.load().unwrap())
        .await
        .unwrap();

    let state = &report.state;
    assert_eq!(state.succeeded().len(), 2);
    assert_eq!(state.succeeded()[&Key::new("casa")], Payload::text("집"));
    assert_eq!(state.succeeded()[&Key::new("agua")], Payload::text("물"));
    let problematic: Vec<&str> = state.problematic().iter().map(Key::as_str).collect();
    assert_eq!(problematic, vec!["xyz123"]);
    let processed: Vec<&str> = state.processed().iter().map(Key::as_str).collect();
    assert_eq!(processed, vec!["agua", "casa", "xyz123"]);

    let report_path = dir.path().join("problematic_words.txt");
    write_problematic_report(&report_path, state.problematic()).unwrap();
    assert_eq!(std::fs::read_to_string(&report_path).unwrap(), "xyz123\n");

    let entries = collect_entries(state.succeeded(), &items);
    assert_eq!(entries[0].metadata, "n");
}

#[tokio::test]
async fn test_full_run_records_every_word() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let items = words(250);

    let mut connector = ScriptedConnector::new();
    for i in (0..250).step_by(25) {
        connector = connector.failing(&format!("word{i:04}"), FailureReason::NoData);
    }
    let connector = Arc::new(connector);

    let report = BatchOrchestrator::new(connector.clone())
        .with_config(config(100, 8))
        .with_store(store.clone())
        .run(&items, store.load().unwrap())
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.summary.batches, 3);
    assert_eq!(report.summary.processed, 250);
    assert_eq!(report.summary.succeeded, 240);
    assert_eq!(report.summary.failed, 10);
    assert_eq!(report.state.problematic().len(), 10);
    assert_eq!(report.summary.success_rate(), 96.0);
    assert_eq!(connector.total_calls(), 250);

    let persisted = store.load().unwrap();
    assert_eq!(persisted.processed().len(), 250);
    assert_eq!(persisted.metadata().total_checkpoints(), 3);

    let artifact = dir.path().join("term_bank_1.json");
    let entries = collect_entries(persisted.succeeded(), &items);
    YomitanSink::new(&artifact).write(&entries).unwrap();
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(rows.len(), 240);
    assert_eq!(rows[0][0], "word0001");

    let report_path = dir.path().join("problematic.txt");
    write_problematic_report(&report_path, persisted.problematic()).unwrap();
    let lines: Vec<String> = std::fs::read_to_string(&report_path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "word0000");
}

#[tokio::test]
async fn test_checkpoint_is_durable_before_next_batch() {
    let dir = TempDir::new().unwrap();
    let store = ProgressStore::new(dir.path().join("progress.json"));
    let items = words(30);

    // word0010 is the first word of the second batch
    let connector = Arc::new(
        ScriptedConnector::new().observing_store_on("word0010", store.clone()),
    );

    BatchOrchestrator::new(connector.clone())
        .with_config(config(10, 4))
        .with_store(store.clone())
        .run(&items, ProgressState::new())
        .await
        .unwrap();

    assert_eq!(connector.observed_processed(), Some(10));
}

#[tokio::test]
async fn test_panicking_connector_is_isolated() {
    let items: Vec<WorkItem> = ["agua", "boom", "casa"].into_iter().map(WorkItem::new).collect();
    let connector = Arc::new(ScriptedConnector::new().panicking("boom"));

    let report = BatchOrchestrator::new(connector)
        .with_config(config(10, 3))
        .run(&items, ProgressState::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.state.succeeded().len(), 2);
    assert!(report.state.problematic().contains(&Key::new("boom")));
    assert!(report.state.is_processed(&Key::new("boom")));
}

#[tokio::test]
async fn test_no_word_is_in_flight_twice() {
    let mut items = words(40);
    items.push(WorkItem::new("word0003"));
    items.insert(0, WorkItem::new("word0007"));

    let connector = Arc::new(ScriptedConnector::new().with_delay(Duration::from_millis(5)));

    let report = BatchOrchestrator::new(connector.clone())
        .with_config(config(8, 8))
        .run(&items, ProgressState::new())
        .await
        .unwrap();

    assert_eq!(report.state.processed().len(), 40);
    assert!(!connector.saw_duplicate_dispatch());
    assert_eq!(connector.calls("word0003"), 1);
    assert_eq!(connector.calls("word0007"), 1);
}

#[tokio::test]
async fn test_failures_never_abort_the_run() {
    let items = words(6);
    let connector = Arc::new(
        ScriptedConnector::new()
            .failing("word0001", FailureReason::TransportError)
            .failing("word0002", FailureReason::Invalid)
            .failing("word0003", FailureReason::NoData),
    );

    let report = BatchOrchestrator::new(connector)
        .with_config(config(2, 2))
        .run(&items, ProgressState::new())
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.summary.batches, 3);
    assert_eq!(report.state.succeeded().len(), 3);
    assert_eq!(report.state.problematic().len(), 3);
}

#[tokio::test]
async fn test_empty_pending_set_still_reports() {
    let items = words(3);
    let mut prior = ProgressState::new();
    for item in &items {
        prior.record(&item.key, dict_builder::orchestrator::Outcome::text("done"));
    }
    let connector = Arc::new(ScriptedConnector::new());

    let report = BatchOrchestrator::new(connector.clone())
        .with_config(config(10, 2))
        .run(&items, prior)
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.summary.pending, 0);
    assert_eq!(report.summary.batches, 0);
    assert_eq!(report.summary.total_succeeded, 3);
    assert_eq!(connector.total_calls(), 0);
}
