//! Unit tests for progress state bookkeeping

use dict_builder::orchestrator::{FailureReason, Outcome, Payload};
use dict_builder::resume::{ProgressState, SCHEMA_VERSION};
use dict_builder::word::{Key, WorkItem};

fn items(keys: &[&str]) -> Vec<WorkItem> {
    keys.iter().map(|k| WorkItem::new(*k)).collect()
}

#[test]
fn test_new_state_is_empty() {
    let state = ProgressState::new();
    assert!(state.processed().is_empty());
    assert!(state.succeeded().is_empty());
    assert!(state.problematic().is_empty());
    assert_eq!(state.schema_version(), SCHEMA_VERSION);
    assert_eq!(state.metadata().total_checkpoints(), 0);
    assert!(state.metadata().created_at().is_some());
}

#[test]
fn test_success_clears_problematic() {
    let key = Key::new("casa");
    let mut state = ProgressState::new();

    state.record(&key, Outcome::Failure(FailureReason::TransportError));
    assert!(state.problematic().contains(&key));
    assert!(state.is_processed(&key));

    state.record(&key, Outcome::text("집"));
    assert!(!state.problematic().contains(&key));
    assert_eq!(state.succeeded()[&key], Payload::text("집"));
    assert!(state.validate().is_ok());
}

#[test]
fn test_failure_keeps_earlier_success() {
    let key = Key::new("agua");
    let mut state = ProgressState::new();

    state.record(&key, Outcome::text("물"));
    state.record(&key, Outcome::Failure(FailureReason::NoData));

    assert_eq!(state.succeeded()[&key], Payload::text("물"));
    assert!(state.problematic().is_empty());
}

#[test]
fn test_pending_orders_problematic_first() {
    let mut state = ProgressState::new();
    state.record(&Key::new("a"), Outcome::text("가"));
    state.record(&Key::new("d"), Outcome::Failure(FailureReason::NoData));
    state.record(&Key::new("b"), Outcome::Failure(FailureReason::Invalid));

    let list = items(&["a", "b", "c", "d", "e", "c"]);

    let keys: Vec<String> = state
        .pending(&list, true)
        .into_iter()
        .map(|i| i.key.to_string())
        .collect();
    assert_eq!(keys, vec!["b", "d", "c", "e"]);

    let keys: Vec<String> = state
        .pending(&list, false)
        .into_iter()
        .map(|i| i.key.to_string())
        .collect();
    assert_eq!(keys, vec!["c", "e"]);
}

#[test]
fn test_problematic_words_outside_list_are_ignored() {
    let mut state = ProgressState::new();
    state.record(&Key::new("gone"), Outcome::Failure(FailureReason::NoData));

    let pending = state.pending(&items(&["casa"]), true);
    assert_eq!(pending, items(&["casa"]));
}

#[test]
fn test_mark_checkpoint_updates_counters() {
    let mut state = ProgressState::new();
    state.record(&Key::new("a"), Outcome::text("가"));
    state.record(&Key::new("b"), Outcome::text("나"));
    state.mark_checkpoint();
    state.mark_checkpoint();

    assert_eq!(state.metadata().total_checkpoints(), 2);
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["results_count"], 2);
    assert_eq!(json["metadata"]["total_checkpoints"], 2);
}

#[test]
fn test_validate_reports_violations() {
    let state: ProgressState = serde_json::from_str(
        r#"{
            "translations": {"casa": "집"},
            "processed_words": [],
            "problematic_words": ["casa"]
        }"#,
    )
    .unwrap();

    let violations = state.validate().unwrap_err();
    assert_eq!(violations.len(), 2);
    assert!(violations.iter().any(|v| v.contains("not marked processed")));
    assert!(violations.iter().any(|v| v.contains("both succeeded and problematic")));
}
