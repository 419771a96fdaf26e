//! Purchase counters that reset at the start of every week.

use crate::{
    buffs::cleanup,
    optimistic::{mutate, RetryPolicy, Step},
    state::Store,
};
use dachsbau_types::{casino::WeeklyCounter, execution::Key};
use std::time::Duration;
use tracing::warn;

/// Purchases of `item_id` in the week starting at `week_start`.
pub async fn weekly_count<S: Store + ?Sized>(
    store: &S,
    username: &str,
    item_id: u32,
    week_start: u64,
) -> u32 {
    let key = Key::Weekly(username.to_string(), item_id);
    match store.get(&key).await {
        Ok(Some(raw)) => match WeeklyCounter::decode(&raw) {
            Ok(counter) => counter.count_for(week_start),
            Err(e) => {
                warn!(%key, error = %e, "malformed weekly counter");
                cleanup(store, &key, "malformed").await;
                0
            }
        },
        Ok(None) => 0,
        Err(e) => {
            warn!(%key, error = %e, "failed to read weekly counter");
            0
        }
    }
}

/// Bump the counter, starting over when it belongs to an earlier week.
///
/// Returns `None` when the write kept losing races.
pub async fn increment_weekly<S: Store + ?Sized>(
    store: &S,
    username: &str,
    item_id: u32,
    week_start: u64,
    ttl: Duration,
    policy: &RetryPolicy,
) -> Option<u32> {
    let key = Key::Weekly(username.to_string(), item_id);
    mutate(store, &key, Some(ttl), policy, |current| {
        let previous = current
            .and_then(|raw| WeeklyCounter::decode(raw).ok())
            .map(|counter| counter.count_for(week_start))
            .unwrap_or(0);
        let counter = WeeklyCounter {
            count: previous.saturating_add(1),
            week_start,
        };
        Step::put(counter.encode(), counter.count)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Memory;

    const WEEK: u64 = 7 * 24 * 3_600_000;
    const TTL: Duration = Duration::from_secs(8 * 24 * 3_600);

    #[tokio::test]
    async fn test_counts_within_week() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        assert_eq!(weekly_count(&store, "alice", 11, WEEK).await, 0);
        assert_eq!(increment_weekly(&store, "alice", 11, WEEK, TTL, &policy).await, Some(1));
        assert_eq!(increment_weekly(&store, "alice", 11, WEEK, TTL, &policy).await, Some(2));
        assert_eq!(weekly_count(&store, "alice", 11, WEEK).await, 2);
        assert_eq!(weekly_count(&store, "alice", 18, WEEK).await, 0);
    }

    #[tokio::test]
    async fn test_stale_week_reads_zero() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        store
            .put(
                &Key::Weekly("alice".into(), 11),
                &WeeklyCounter {
                    count: 99,
                    week_start: WEEK,
                }
                .encode(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(weekly_count(&store, "alice", 11, 2 * WEEK).await, 0);
        assert_eq!(
            increment_weekly(&store, "alice", 11, 2 * WEEK, TTL, &policy).await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_malformed_counter_is_removed() {
        let store = Memory::default();
        let key = Key::Weekly("alice".into(), 18);
        store.put(&key, "{\"count\":", None).await.unwrap();
        assert_eq!(weekly_count(&store, "alice", 18, WEEK).await, 0);
        assert_eq!(store.get(&key).await, Ok(None));
    }
}
