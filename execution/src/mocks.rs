//! Test doubles for the storage and clock capabilities.

use crate::state::{Clock, Memory, Store, StoreError};
use dachsbau_types::execution::Key;
use std::{
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(now_ms),
        })
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Which operations a [FaultyStore] should fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    pub get: bool,
    pub put: bool,
    pub delete: bool,
}

/// Wraps a store and fails selected operations on keys whose string form
/// starts with one of the configured prefixes.
pub struct FaultyStore<S> {
    inner: S,
    rules: Mutex<Vec<(String, Faults)>>,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rules: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, prefix: &str, faults: Faults) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push((prefix.to_string(), faults));
        }
    }

    pub fn heal(&self) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.clear();
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn faults(&self, key: &Key) -> Faults {
        let key = key.to_string();
        let rules = match self.rules.lock() {
            Ok(rules) => rules,
            Err(_) => return Faults::default(),
        };
        rules
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .fold(Faults::default(), |acc, (_, f)| Faults {
                get: acc.get || f.get,
                put: acc.put || f.put,
                delete: acc.delete || f.delete,
            })
    }
}

fn injected(key: &Key) -> StoreError {
    StoreError::Unavailable(format!("injected fault on {key}"))
}

impl<S: Store> Store for FaultyStore<S> {
    async fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        if self.faults(key).get {
            return Err(injected(key));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &Key, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if self.faults(key).put {
            return Err(injected(key));
        }
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        if self.faults(key).delete {
            return Err(injected(key));
        }
        self.inner.delete(key).await
    }
}

/// Simulates a concurrent writer: right after each of the next `races`
/// writes to `key`, the store silently replaces the value with `intruder`.
pub struct RacingStore {
    inner: Memory,
    key: Key,
    intruder: String,
    races: AtomicU32,
    writes: AtomicU32,
}

impl RacingStore {
    pub fn new(inner: Memory, key: Key, intruder: &str, races: u32) -> Self {
        Self {
            inner,
            key,
            intruder: intruder.to_string(),
            races: AtomicU32::new(races),
            writes: AtomicU32::new(0),
        }
    }

    /// Writes attempted against the raced key.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_race(&self) -> bool {
        self.races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Store for RacingStore {
    async fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &Key, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if *key != self.key {
            return self.inner.put(key, value, ttl).await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.take_race() {
            return self.inner.put(key, &self.intruder, ttl).await;
        }
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        if *key != self.key {
            return self.inner.delete(key).await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.take_race() {
            return self.inner.put(key, &self.intruder, None).await;
        }
        self.inner.delete(key).await
    }
}

/// Yields to the scheduler before every operation, so futures joined over
/// it interleave their reads and writes.
pub struct YieldingStore<S> {
    inner: S,
}

impl<S: Store> YieldingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Store> Store for YieldingStore<S> {
    async fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn put(&self, key: &Key, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.delete(key).await
    }
}
