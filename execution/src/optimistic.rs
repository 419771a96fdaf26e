//! Read-modify-write-verify over a store without compare-and-swap.
//!
//! [mutate] reads a key, lets the caller compute the replacement, writes it,
//! then re-reads to check that no concurrent writer replaced it in between.
//! A lost race backs off exponentially and starts over from a fresh read.
//! Exhausting the attempt budget is logged and reported as `None`; callers
//! treat that as a no-op.

use crate::state::Store;
use dachsbau_types::{config::RetryConfig, execution::Key};
use rand::{rngs::OsRng, Rng};
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the value a consumer parks on a flag while claiming it.
const CLAIM_PREFIX: &str = "claim:";

/// Lifetime of a parked claim that was never cleaned up.
const CLAIM_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Retries without sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// What a mutation wants to do with the value it just read.
pub enum Step<R> {
    /// Write `value` (or delete the key when `None`) and report `result`
    /// once the write is verified. A `ttl` overrides the one given to
    /// [mutate].
    Write {
        value: Option<String>,
        ttl: Option<Duration>,
        result: R,
    },
    /// Leave the key untouched and report `result` immediately.
    Abort(R),
}

impl<R> Step<R> {
    pub fn put(value: String, result: R) -> Self {
        Step::Write {
            value: Some(value),
            ttl: None,
            result,
        }
    }

    /// Like [Step::put], for records that carry their own expiry.
    pub fn put_expiring(value: String, ttl: Duration, result: R) -> Self {
        Step::Write {
            value: Some(value),
            ttl: Some(ttl),
            result,
        }
    }

    pub fn delete(result: R) -> Self {
        Step::Write {
            value: None,
            ttl: None,
            result,
        }
    }
}

/// Apply `compute` to the current value of `key` until the write sticks.
///
/// `compute` may be invoked once per attempt and must be free of side
/// effects beyond producing its [Step].
pub async fn mutate<S, R, F>(
    store: &S,
    key: &Key,
    ttl: Option<Duration>,
    policy: &RetryPolicy,
    mut compute: F,
) -> Option<R>
where
    S: Store + ?Sized,
    F: FnMut(Option<&str>) -> Step<R>,
{
    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let current = match store.get(key).await {
            Ok(current) => current,
            Err(e) => {
                warn!(%key, attempt, error = %e, "read failed during mutation");
                continue;
            }
        };

        let (intended, expiry, result) = match compute(current.as_deref()) {
            Step::Abort(result) => return Some(result),
            Step::Write { value, ttl: own, result } => (value, own.or(ttl), result),
        };

        let written = match &intended {
            Some(value) => store.put(key, value, expiry).await,
            None => store.delete(key).await,
        };
        if let Err(e) = written {
            warn!(%key, attempt, error = %e, "write failed during mutation");
            continue;
        }

        match store.get(key).await {
            Ok(observed) if observed == intended => return Some(result),
            Ok(_) => debug!(%key, attempt, "lost write race, retrying"),
            Err(e) => warn!(%key, attempt, error = %e, "verify read failed during mutation"),
        }
    }

    warn!(%key, attempts = policy.max_attempts, "giving up on mutation");
    None
}

/// Whether `value` is a consumer's parked claim rather than a live flag.
pub fn is_claim(value: &str) -> bool {
    value.starts_with(CLAIM_PREFIX)
}

/// Consume a one-shot flag.
///
/// The consumer first parks a marker of its own on the key and re-reads it.
/// Only the consumer whose marker survived deletes the flag and wins, so of
/// two racing consumers at most one returns `true`. Returns `false` when the
/// flag was absent, already being claimed, or could not be removed.
pub async fn consume_flag<S: Store + ?Sized>(store: &S, key: &Key) -> bool {
    match store.get(key).await {
        Ok(Some(value)) if !is_claim(&value) => {}
        Ok(_) => return false,
        Err(e) => {
            warn!(%key, error = %e, "failed to read flag");
            return false;
        }
    }

    let marker = format!("{CLAIM_PREFIX}{:016x}", OsRng.gen::<u64>());
    if let Err(e) = store.put(key, &marker, Some(CLAIM_TTL)).await {
        warn!(%key, error = %e, "failed to claim flag");
        return false;
    }
    match store.get(key).await {
        Ok(Some(value)) if value == marker => {}
        Ok(_) => {
            debug!(%key, "lost flag claim");
            return false;
        }
        Err(e) => {
            warn!(%key, error = %e, "failed to verify flag claim");
            return false;
        }
    }

    // The marker expires on its own if this delete fails
    if let Err(e) = store.delete(key).await {
        warn!(%key, error = %e, "failed to delete claimed flag");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{Faults, FaultyStore, ManualClock, RacingStore, YieldingStore},
        state::Memory,
    };

    fn counter_key() -> Key {
        Key::Insurance("alice".into())
    }

    fn increment(current: Option<&str>) -> Step<u32> {
        let value = current.and_then(|v| v.parse::<u32>().ok()).unwrap_or(0) + 1;
        Step::put(value.to_string(), value)
    }

    #[tokio::test]
    async fn test_mutate_applies() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, increment).await,
            Some(1)
        );
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, increment).await,
            Some(2)
        );
        assert_eq!(store.get(&counter_key()).await, Ok(Some("2".into())));
    }

    #[tokio::test]
    async fn test_mutate_retries_after_lost_race() {
        let store = RacingStore::new(Memory::default(), counter_key(), "7", 1);
        let policy = RetryPolicy::immediate(3);

        // First write is clobbered with "7"; the retry re-reads 7 and writes 8.
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, increment).await,
            Some(8)
        );
        assert_eq!(store.writes(), 2);
        assert_eq!(store.get(&counter_key()).await, Ok(Some("8".into())));
    }

    #[tokio::test]
    async fn test_mutate_gives_up() {
        let store = RacingStore::new(Memory::default(), counter_key(), "intruder", 10);
        let policy = RetryPolicy::immediate(3);
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, increment).await,
            None
        );
        assert_eq!(store.writes(), 3);
    }

    #[tokio::test]
    async fn test_mutate_abort_skips_write() {
        let store = RacingStore::new(Memory::default(), counter_key(), "x", 0);
        let policy = RetryPolicy::immediate(3);
        let result = mutate(&store, &counter_key(), None, &policy, |_| Step::Abort("nope")).await;
        assert_eq!(result, Some("nope"));
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_mutate_delete_verifies_absence() {
        let store = Memory::default();
        store.put(&counter_key(), "1", None).await.unwrap();
        let policy = RetryPolicy::immediate(1);
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, |_| Step::delete(())).await,
            Some(())
        );
        assert_eq!(store.get(&counter_key()).await, Ok(None));
    }

    #[tokio::test]
    async fn test_mutate_survives_store_outage() {
        let store = FaultyStore::new(Memory::default());
        store.fail(
            "insurance:",
            Faults {
                get: true,
                ..Faults::default()
            },
        );
        let policy = RetryPolicy::immediate(2);
        assert_eq!(
            mutate(&store, &counter_key(), None, &policy, increment).await,
            None
        );
    }

    #[tokio::test]
    async fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(10),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(10));
        assert_eq!(policy.delay(2), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_consume_flag_once() {
        let store = Memory::default();
        let key = Key::WinMultiplier("alice".into());
        store.put(&key, "active", None).await.unwrap();

        assert!(consume_flag(&store, &key).await);
        assert!(!consume_flag(&store, &key).await);
    }

    #[tokio::test]
    async fn test_consume_flag_concurrent_single_winner() {
        let store = YieldingStore::new(Memory::default());
        let key = Key::WinMultiplier("alice".into());
        store.put(&key, "active", None).await.unwrap();

        let (a, b) = futures::join!(consume_flag(&store, &key), consume_flag(&store, &key));
        assert!(a ^ b);
        assert_eq!(store.get(&key).await, Ok(None));
    }

    #[tokio::test]
    async fn test_consume_flag_skips_parked_claim() {
        let store = Memory::default();
        let key = Key::WinMultiplier("alice".into());
        store.put(&key, "claim:00000000000000ff", None).await.unwrap();
        assert!(!consume_flag(&store, &key).await);
        assert!(is_claim("claim:00000000000000ff"));
        assert!(!is_claim("active"));
    }

    #[tokio::test]
    async fn test_consume_flag_delete_failure() {
        let store = FaultyStore::new(Memory::default());
        let key = Key::WinMultiplier("alice".into());
        store.put(&key, "active", None).await.unwrap();
        store.fail(
            "winmulti:",
            Faults {
                delete: true,
                ..Faults::default()
            },
        );
        // Claimed even though the marker stays behind
        assert!(consume_flag(&store, &key).await);
        store.heal();
        assert!(!consume_flag(&store, &key).await);
    }

    #[tokio::test]
    async fn test_consume_flag_claim_write_failure() {
        let store = FaultyStore::new(Memory::default());
        let key = Key::WinMultiplier("alice".into());
        store.put(&key, "active", None).await.unwrap();
        store.fail(
            "winmulti:",
            Faults {
                put: true,
                ..Faults::default()
            },
        );
        assert!(!consume_flag(&store, &key).await);
        store.heal();
        assert!(consume_flag(&store, &key).await);
    }

    #[tokio::test]
    async fn test_mutate_step_ttl_overrides_default() {
        let clock = ManualClock::new(0);
        let store = Memory::new(clock.clone());
        let policy = RetryPolicy::immediate(1);
        let key = counter_key();
        mutate(&store, &key, Some(Duration::from_secs(60)), &policy, |_| {
            Step::put_expiring("1".into(), Duration::from_secs(1), ())
        })
        .await;
        clock.advance(2_000);
        assert_eq!(store.get(&key).await, Ok(None));
    }
}
