use dachsbau_types::execution::Key;
use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, RwLock},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Failures of the storage capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("gave up on {key} after {attempts} attempts")]
    Contended { key: String, attempts: u32 },
}

/// Eventually-consistent key-value store.
///
/// Offers no cross-key atomicity and no compare-and-swap; callers that need
/// to survive concurrent writers layer [crate::optimistic] on top.
pub trait Store {
    fn get(&self, key: &Key) -> impl Future<Output = Result<Option<String>, StoreError>>;
    fn put(
        &self,
        key: &Key,
        value: &str,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>>;
    fn delete(&self, key: &Key) -> impl Future<Output = Result<(), StoreError>>;
}

impl<S: Store> Store for &S {
    async fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &Key, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        (**self).put(key, value, ttl).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

/// Source of wall-clock time in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

struct Entry {
    value: String,
    expires_at: Option<u64>,
}

/// In-process store with TTL eviction on read.
pub struct Memory {
    clock: Arc<dyn Clock>,
    state: RwLock<HashMap<String, Entry>>,
}

impl Memory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.state
            .read()
            .map(|state| {
                state
                    .values()
                    .filter(|entry| entry.expires_at.map_or(true, |at| now < at))
                    .count()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl Store for Memory {
    async fn get(&self, key: &Key) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_ms();
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(state
            .get(&key.to_string())
            .filter(|entry| entry.expires_at.map_or(true, |at| now < at))
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &Key, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = ttl.map(|ttl| self.clock.now_ms().saturating_add(ttl.as_millis() as u64));
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        state.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        state.remove(&key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ManualClock;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let store = Memory::default();
        let key = Key::Balance("alice".into());
        assert_eq!(store.get(&key).await, Ok(None));

        store.put(&key, "42", None).await.unwrap();
        assert_eq!(store.get(&key).await, Ok(Some("42".to_string())));

        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await, Ok(None));
    }

    #[tokio::test]
    async fn test_memory_ttl_expiry() {
        let clock = ManualClock::new(1_000);
        let store = Memory::new(clock.clone());
        let key = Key::Cooldown("alice".into());

        store
            .put(&key, "1000", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        clock.advance(29_999);
        assert!(store.get(&key).await.unwrap().is_some());

        clock.advance(1);
        assert_eq!(store.get(&key).await, Ok(None));
        assert!(store.is_empty());
    }
}
