//! Scripted connector shared by the orchestration tests

#![allow(dead_code)]

use async_trait::async_trait;
use dict_builder::connector::SourceConnector;
use dict_builder::orchestrator::{FailureReason, Outcome, RateLimiter};
use dict_builder::resume::ProgressStore;
use dict_builder::shutdown::SharedStop;
use dict_builder::word::WorkItem;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Succeeds with `t:<word>` unless scripted otherwise
#[derive(Default)]
pub struct ScriptedConnector {
    translations: HashMap<String, String>,
    failures: HashMap<String, FailureReason>,
    panics: HashSet<String>,
    delay: Duration,
    limiter: Option<Arc<RateLimiter>>,
    stop_on: Option<(String, SharedStop)>,
    observe: Option<(String, ProgressStore)>,

    calls: Mutex<HashMap<String, u32>>,
    in_flight: Mutex<HashSet<String>>,
    duplicate_dispatch: AtomicBool,
    grants: Mutex<Vec<Instant>>,
    observed_processed: Mutex<Option<usize>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translating(mut self, key: &str, translation: &str) -> Self {
        self.translations.insert(key.to_string(), translation.to_string());
        self
    }

    pub fn failing(mut self, key: &str, reason: FailureReason) -> Self {
        self.failures.insert(key.to_string(), reason);
        self
    }

    pub fn panicking(mut self, key: &str) -> Self {
        self.panics.insert(key.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Request a stop while fetching `key`
    pub fn stopping_on(mut self, key: &str, stop: SharedStop) -> Self {
        self.stop_on = Some((key.to_string(), stop));
        self
    }

    /// Read the persisted state while fetching `key`
    pub fn observing_store_on(mut self, key: &str, store: ProgressStore) -> Self {
        self.observe = Some((key.to_string(), store));
        self
    }

    pub fn calls(&self, key: &str) -> u32 {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn saw_duplicate_dispatch(&self) -> bool {
        self.duplicate_dispatch.load(Ordering::SeqCst)
    }

    pub fn grant_times(&self) -> Vec<Instant> {
        self.grants.lock().unwrap().clone()
    }

    pub fn observed_processed(&self) -> Option<usize> {
        *self.observed_processed.lock().unwrap()
    }
}

#[async_trait]
impl SourceConnector for ScriptedConnector {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, item: &WorkItem, _timeout: Duration) -> Outcome {
        let key = item.key.to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        if !self.in_flight.lock().unwrap().insert(key.clone()) {
            self.duplicate_dispatch.store(true, Ordering::SeqCst);
        }

        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
            self.grants.lock().unwrap().push(Instant::now());
        }
        if let Some((observed_key, store)) = &self.observe {
            if *observed_key == key {
                let processed = store.load().map(|s| s.processed().len()).unwrap_or(0);
                *self.observed_processed.lock().unwrap() = Some(processed);
            }
        }
        if let Some((stop_key, stop)) = &self.stop_on {
            if *stop_key == key {
                stop.request_stop();
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.lock().unwrap().remove(&key);

        if self.panics.contains(&key) {
            panic!("scripted panic for {key}");
        }
        match self.failures.get(&key) {
            Some(reason) => Outcome::Failure(*reason),
            None => match self.translations.get(&key) {
                Some(translation) => Outcome::text(translation.as_str()),
                None => Outcome::text(format!("t:{key}")),
            },
        }
    }
}

pub fn words(n: usize) -> Vec<WorkItem> {
    (0..n).map(|i| WorkItem::new(format!("word{i:04}"))).collect()
}
