//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use bot_state_cache::cache::field_store::ScopedCache;
use bot_state_cache::cache::key::EntityKey;
use bot_state_cache::cache::report::FailureReporter;
use bot_state_cache::cache::ttl::CacheSettings;
use bot_state_cache::conversation::{DispatchError, Update};
use bot_state_cache::store::memory::MemoryStore;
use bot_state_cache::store::{KeyValueStore, StoreError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(180);

/// A [`MemoryStore`] that records writes and can be told to fail.
#[derive(Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_clear: AtomicBool,
    writes: Mutex<Vec<(String, Option<Duration>)>>,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every `set` seen so far, as (key, ttl).
    pub fn writes(&self) -> Vec<(String, Option<Duration>)> {
        self.writes.lock().clone()
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        self.writes.lock().last().and_then(|(_, ttl)| *ttl)
    }
}

fn down() -> StoreError {
    StoreError::Unavailable("injected failure".to_string())
}

#[async_trait]
impl KeyValueStore for TestStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), StoreError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.writes.lock().push((key.to_string(), ttl));
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.delete(key).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<(), StoreError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.delete_multiple(keys).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(down());
        }
        self.inner.clear().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Write(String),
    Read(String),
    Clear(Vec<String>),
    Dispatch { chat_id: i64, update_id: i64, error: String },
}

/// Collects every report.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn dispatch_reports(&self) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|r| matches!(r, Report::Dispatch { .. }))
            .count()
    }
}

impl FailureReporter for RecordingReporter {
    fn write_failed(&self, key: &EntityKey, _err: &StoreError) {
        self.reports.lock().push(Report::Write(key.to_string()));
    }

    fn read_failed(&self, key: &EntityKey, _err: &StoreError) {
        self.reports.lock().push(Report::Read(key.to_string()));
    }

    fn clear_failed(&self, keys: &[EntityKey], _err: &StoreError) {
        self.reports
            .lock()
            .push(Report::Clear(keys.iter().map(ToString::to_string).collect()));
    }

    fn dispatch_failed(&self, chat_id: i64, update: &Update, err: &DispatchError) {
        self.reports.lock().push(Report::Dispatch {
            chat_id,
            update_id: update.update_id,
            error: err.to_string(),
        });
    }
}

pub struct Harness {
    pub store: Arc<TestStore>,
    pub settings: Arc<CacheSettings>,
    pub reporter: Arc<RecordingReporter>,
    pub cache: ScopedCache,
}

pub fn harness() -> Harness {
    let store = TestStore::new();
    let settings = Arc::new(CacheSettings::new(Some(DEFAULT_TTL)));
    let reporter = RecordingReporter::new();
    let cache = ScopedCache::new(store.clone(), settings.clone()).with_reporter(reporter.clone());
    Harness {
        store,
        settings,
        reporter,
        cache,
    }
}

pub fn update(update_id: i64, chat_id: i64, text: Option<&str>) -> Update {
    Update {
        update_id,
        chat_id,
        user_id: Some(1000 + chat_id),
        text: text.map(str::to_string),
    }
}
