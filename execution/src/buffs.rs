//! Timed buffs, one-shot flags and insurance charges.
//!
//! Reads never fail: missing, malformed, expired or unreadable records all
//! come back as inactive, and the stale key is removed on a best-effort basis.

use crate::{
    optimistic::{is_claim, mutate, RetryPolicy, Step},
    slots::Modifiers,
    state::{Store, StoreError},
};
use dachsbau_types::{
    casino::{BuffKind, BuffRecord, BuffShape, FLAG_ACTIVE, MAX_STACK},
    execution::Key,
};
use futures::future::join_all;
use std::{collections::BTreeMap, time::Duration};
use tracing::{debug, warn};

pub(crate) async fn cleanup<S: Store + ?Sized>(store: &S, key: &Key, reason: &'static str) {
    match store.delete(key).await {
        Ok(()) => debug!(%key, reason, "removed stale record"),
        Err(e) => warn!(%key, reason, error = %e, "failed to remove stale record"),
    }
}

/// Remaining lifetime of a record, used as the key TTL on rewrites.
fn remaining(expire_at: u64, now_ms: u64) -> Duration {
    Duration::from_millis(expire_at.saturating_sub(now_ms).max(1))
}

/// Active record for `kind`, or `None`.
pub async fn read_buff<S: Store + ?Sized>(
    store: &S,
    username: &str,
    kind: BuffKind,
    now_ms: u64,
) -> Option<BuffRecord> {
    let key = Key::Buff(username.to_string(), kind);
    let raw = match store.get(&key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(%key, error = %e, "failed to read buff");
            return None;
        }
    };
    let record = match BuffRecord::decode(kind.shape(), &raw) {
        Ok(record) => record,
        Err(e) => {
            warn!(%key, error = %e, "malformed buff");
            cleanup(store, &key, "malformed").await;
            return None;
        }
    };
    if !record.is_active(now_ms) {
        cleanup(store, &key, "expired").await;
        return None;
    }
    Some(record)
}

pub async fn is_buff_active<S: Store + ?Sized>(
    store: &S,
    username: &str,
    kind: BuffKind,
    now_ms: u64,
) -> bool {
    read_buff(store, username, kind, now_ms).await.is_some()
}

/// Every active buff of a user, read concurrently.
pub async fn active_buffs<S: Store + ?Sized>(
    store: &S,
    username: &str,
    now_ms: u64,
) -> BTreeMap<BuffKind, BuffRecord> {
    let reads = BuffKind::ALL
        .into_iter()
        .map(|kind| async move { (kind, read_buff(store, username, kind, now_ms).await) });
    join_all(reads)
        .await
        .into_iter()
        .filter_map(|(kind, record)| record.map(|record| (kind, record)))
        .collect()
}

impl Modifiers {
    pub fn from_buffs(buffs: &BTreeMap<BuffKind, BuffRecord>) -> Self {
        let rage_stack = match buffs.get(&BuffKind::RageMode) {
            Some(BuffRecord::Stack { stack, .. }) => *stack,
            _ => 0,
        };
        Self {
            lucky_charm: buffs.contains_key(&BuffKind::LuckyCharm),
            locator: buffs.contains_key(&BuffKind::DachsLocator),
            rage_stack,
            star_magnet: buffs.contains_key(&BuffKind::StarMagnet),
            diamond_rush: buffs.contains_key(&BuffKind::DiamondRush),
        }
    }
}

/// Start (or refresh) a buff for `duration`.
///
/// Refreshing keeps an active rage stack; use-limited buffs get their uses
/// reset to `uses`.
pub async fn activate_buff<S: Store + ?Sized>(
    store: &S,
    username: &str,
    kind: BuffKind,
    duration: Duration,
    uses: Option<u32>,
    now_ms: u64,
) -> Result<BuffRecord, StoreError> {
    let expire_at = now_ms.saturating_add(duration.as_millis() as u64);
    let record = match kind.shape() {
        BuffShape::Simple => BuffRecord::Simple { expire_at },
        BuffShape::Uses => BuffRecord::Uses {
            expire_at,
            uses: uses.unwrap_or(1),
        },
        BuffShape::Stack => {
            let stack = match read_buff(store, username, kind, now_ms).await {
                Some(BuffRecord::Stack { stack, .. }) => stack,
                _ => 0,
            };
            BuffRecord::Stack { expire_at, stack }
        }
    };
    let key = Key::Buff(username.to_string(), kind);
    store
        .put(&key, &record.encode(), Some(remaining(expire_at, now_ms)))
        .await?;
    debug!(%key, expire_at, "activated buff");
    Ok(record)
}

/// Spend one use of a use-limited buff. Returns whether a use was taken.
pub async fn consume_buff_use<S: Store + ?Sized>(
    store: &S,
    username: &str,
    kind: BuffKind,
    now_ms: u64,
    policy: &RetryPolicy,
) -> bool {
    let key = Key::Buff(username.to_string(), kind);
    mutate(store, &key, None, policy, |current| {
        let Some(raw) = current else {
            return Step::Abort(false);
        };
        match BuffRecord::decode(BuffShape::Uses, raw) {
            Ok(BuffRecord::Uses { expire_at, uses }) if now_ms < expire_at && uses > 0 => {
                if uses == 1 {
                    Step::delete(true)
                } else {
                    let next = BuffRecord::Uses {
                        expire_at,
                        uses: uses - 1,
                    };
                    Step::put_expiring(next.encode(), remaining(expire_at, now_ms), true)
                }
            }
            _ => Step::Abort(false),
        }
    })
    .await
    .unwrap_or(false)
}

/// Grow the rage stack after a loss or reset it after a win.
///
/// Returns the new stack, or `None` when rage mode is not active.
pub async fn update_rage<S: Store + ?Sized>(
    store: &S,
    username: &str,
    won: bool,
    step: u32,
    max: u32,
    now_ms: u64,
    policy: &RetryPolicy,
) -> Option<u32> {
    let key = Key::Buff(username.to_string(), BuffKind::RageMode);
    let ceiling = max.min(MAX_STACK);
    let stack = mutate(store, &key, None, policy, |current| {
        let record = current.and_then(|raw| BuffRecord::decode(BuffShape::Stack, raw).ok());
        match record {
            Some(BuffRecord::Stack { expire_at, stack }) if now_ms < expire_at => {
                let stack = if won {
                    0
                } else {
                    stack.saturating_add(step).min(ceiling)
                };
                Step::put_expiring(
                    BuffRecord::Stack { expire_at, stack }.encode(),
                    remaining(expire_at, now_ms),
                    Some(stack),
                )
            }
            _ => Step::Abort(None),
        }
    })
    .await
    .flatten()?;
    debug!(%key, stack, "updated rage stack");
    Some(stack)
}

/// Set a flag. Unlocks pass no TTL and never expire.
pub async fn grant_flag<S: Store + ?Sized>(
    store: &S,
    key: &Key,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    store.put(key, FLAG_ACTIVE, ttl).await
}

/// Whether `key` holds a flag that nobody is in the middle of consuming.
pub async fn has_flag<S: Store + ?Sized>(store: &S, key: &Key) -> bool {
    match store.get(key).await {
        Ok(value) => value.is_some_and(|value| !is_claim(&value)),
        Err(e) => {
            warn!(%key, error = %e, "failed to read flag");
            false
        }
    }
}

fn parse_count(raw: Option<&str>) -> u32 {
    raw.and_then(|raw| raw.trim().parse().ok()).unwrap_or(0)
}

pub async fn insurance_count<S: Store + ?Sized>(store: &S, username: &str) -> u32 {
    let key = Key::Insurance(username.to_string());
    match store.get(&key).await {
        Ok(Some(raw)) => match raw.trim().parse() {
            Ok(count) => count,
            Err(_) => {
                cleanup(store, &key, "malformed").await;
                0
            }
        },
        Ok(None) => 0,
        Err(e) => {
            warn!(%key, error = %e, "failed to read insurance");
            0
        }
    }
}

/// Add insurance charges. Returns the new total, or `None` when the write
/// kept losing races.
pub async fn add_insurance<S: Store + ?Sized>(
    store: &S,
    username: &str,
    count: u32,
    policy: &RetryPolicy,
) -> Option<u32> {
    let key = Key::Insurance(username.to_string());
    mutate(store, &key, None, policy, |current| {
        let total = parse_count(current).saturating_add(count);
        Step::put(total.to_string(), total)
    })
    .await
}

/// Spend one insurance charge. Returns whether one was available.
pub async fn use_insurance<S: Store + ?Sized>(
    store: &S,
    username: &str,
    policy: &RetryPolicy,
) -> bool {
    let key = Key::Insurance(username.to_string());
    mutate(store, &key, None, policy, |current| match parse_count(current) {
        0 => Step::Abort(false),
        1 => Step::delete(true),
        n => Step::put((n - 1).to_string(), true),
    })
    .await
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{Faults, FaultyStore, ManualClock},
        state::Memory,
    };

    const NOW: u64 = 1_700_000_000_000;
    const HOUR: Duration = Duration::from_secs(3_600);

    fn store() -> Memory {
        Memory::new(ManualClock::new(NOW))
    }

    #[tokio::test]
    async fn test_activate_and_read() {
        let store = store();
        let record = activate_buff(&store, "alice", BuffKind::LuckyCharm, HOUR, None, NOW)
            .await
            .unwrap();
        assert_eq!(
            record,
            BuffRecord::Simple {
                expire_at: NOW + 3_600_000
            }
        );
        assert!(is_buff_active(&store, "alice", BuffKind::LuckyCharm, NOW).await);
        assert!(!is_buff_active(&store, "alice", BuffKind::StarMagnet, NOW).await);
        assert!(!is_buff_active(&store, "bob", BuffKind::LuckyCharm, NOW).await);
    }

    #[tokio::test]
    async fn test_expired_buff_read_twice() {
        let clock = ManualClock::new(NOW);
        let inner = Memory::new(clock.clone());
        activate_buff(&inner, "alice", BuffKind::GoldenHour, HOUR, None, NOW)
            .await
            .unwrap();
        let store = FaultyStore::new(inner);
        store.fail(
            "buff:",
            Faults {
                delete: true,
                ..Faults::default()
            },
        );

        // Read with a later `now` while the store still holds the key
        let later = NOW + 3_600_000;
        assert!(!is_buff_active(&store, "alice", BuffKind::GoldenHour, later).await);
        assert!(!is_buff_active(&store, "alice", BuffKind::GoldenHour, later).await);
        let key = Key::Buff("alice".into(), BuffKind::GoldenHour);
        assert!(store.inner().get(&key).await.unwrap().is_some());

        store.heal();
        assert!(!is_buff_active(&store, "alice", BuffKind::GoldenHour, later).await);
        assert_eq!(store.inner().get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_buff_is_removed() {
        let store = store();
        let key = Key::Buff("alice".into(), BuffKind::DachsLocator);
        store.put(&key, "{\"expireAt\":", None).await.unwrap();
        assert!(!is_buff_active(&store, "alice", BuffKind::DachsLocator, NOW).await);
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_locator_uses_run_out() {
        let store = store();
        let policy = RetryPolicy::immediate(3);
        activate_buff(&store, "alice", BuffKind::DachsLocator, HOUR, Some(2), NOW)
            .await
            .unwrap();

        assert!(consume_buff_use(&store, "alice", BuffKind::DachsLocator, NOW, &policy).await);
        assert!(is_buff_active(&store, "alice", BuffKind::DachsLocator, NOW).await);
        assert!(consume_buff_use(&store, "alice", BuffKind::DachsLocator, NOW, &policy).await);
        assert!(!is_buff_active(&store, "alice", BuffKind::DachsLocator, NOW).await);
        assert!(!consume_buff_use(&store, "alice", BuffKind::DachsLocator, NOW, &policy).await);
    }

    #[tokio::test]
    async fn test_rage_stack_grows_and_resets() {
        let store = store();
        let policy = RetryPolicy::immediate(3);
        assert_eq!(update_rage(&store, "alice", false, 5, 50, NOW, &policy).await, None);

        activate_buff(&store, "alice", BuffKind::RageMode, HOUR, None, NOW)
            .await
            .unwrap();
        for expected in [5, 10, 15] {
            assert_eq!(
                update_rage(&store, "alice", false, 5, 50, NOW, &policy).await,
                Some(expected)
            );
        }
        // Refreshing keeps the stack
        let refreshed = activate_buff(&store, "alice", BuffKind::RageMode, HOUR, None, NOW + 10)
            .await
            .unwrap();
        assert!(matches!(refreshed, BuffRecord::Stack { stack: 15, .. }));

        for _ in 0..20 {
            update_rage(&store, "alice", false, 5, 50, NOW, &policy).await;
        }
        let buffs = active_buffs(&store, "alice", NOW).await;
        assert_eq!(Modifiers::from_buffs(&buffs).rage_stack, 50);

        assert_eq!(update_rage(&store, "alice", true, 5, 50, NOW, &policy).await, Some(0));
    }

    #[tokio::test]
    async fn test_rewrites_keep_expiry() {
        let clock = ManualClock::new(NOW);
        let store = Memory::new(clock.clone());
        let policy = RetryPolicy::immediate(3);
        activate_buff(&store, "alice", BuffKind::DachsLocator, HOUR, Some(5), NOW)
            .await
            .unwrap();
        activate_buff(&store, "alice", BuffKind::RageMode, HOUR, None, NOW)
            .await
            .unwrap();

        assert!(consume_buff_use(&store, "alice", BuffKind::DachsLocator, NOW, &policy).await);
        assert_eq!(
            update_rage(&store, "alice", false, 5, 50, NOW, &policy).await,
            Some(5)
        );
        assert_eq!(store.len(), 2);

        clock.advance(2 * 3_600_000);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_modifiers_from_buffs() {
        let store = store();
        for kind in [BuffKind::LuckyCharm, BuffKind::StarMagnet] {
            activate_buff(&store, "alice", kind, HOUR, None, NOW)
                .await
                .unwrap();
        }
        let buffs = active_buffs(&store, "alice", NOW).await;
        assert_eq!(buffs.len(), 2);
        let modifiers = Modifiers::from_buffs(&buffs);
        assert!(modifiers.lucky_charm && modifiers.star_magnet);
        assert!(!modifiers.locator && !modifiers.diamond_rush);
    }

    #[tokio::test]
    async fn test_insurance_charges() {
        let store = store();
        let policy = RetryPolicy::immediate(3);
        assert_eq!(add_insurance(&store, "alice", 5, &policy).await, Some(5));
        assert_eq!(add_insurance(&store, "alice", 5, &policy).await, Some(10));
        assert!(use_insurance(&store, "alice", &policy).await);
        assert_eq!(insurance_count(&store, "alice").await, 9);

        assert!(!use_insurance(&store, "bob", &policy).await);
        store
            .put(&Key::Insurance("bob".into()), "lots", None)
            .await
            .unwrap();
        assert_eq!(insurance_count(&store, "bob").await, 0);
        assert_eq!(store.get(&Key::Insurance("bob".into())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flags() {
        let store = FaultyStore::new(Memory::default());
        let key = Key::WinMultiplier("alice".into());
        assert!(!has_flag(&store, &key).await);
        grant_flag(&store, &key, Some(HOUR)).await.unwrap();
        assert!(has_flag(&store, &key).await);

        store.fail(
            "winmulti:",
            Faults {
                get: true,
                put: true,
                ..Faults::default()
            },
        );
        assert!(!has_flag(&store, &key).await);
        assert!(grant_flag(&store, &key, Some(HOUR)).await.is_err());

        // A flag someone is consuming no longer counts as held
        store.heal();
        store
            .put(&key, "claim:0000000000000001", Some(HOUR))
            .await
            .unwrap();
        assert!(!has_flag(&store, &key).await);
    }
}
