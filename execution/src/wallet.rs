//! Balances, the house bank and the small per-user counters around them.

use crate::{
    buffs::cleanup,
    optimistic::{mutate, RetryPolicy, Step},
    state::{Store, StoreError},
};
use dachsbau_types::{
    casino::{Rank, Streak},
    config::EconomyConfig,
    execution::Key,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Clamp a signed amount into `[0, max]`.
pub fn clamp_balance(value: i64, max: u64) -> u64 {
    (value.max(0) as u64).min(max)
}

/// Current balance. A user without a record starts with the configured
/// starting balance, which is persisted on first read.
pub async fn get_balance<S: Store + ?Sized>(
    store: &S,
    username: &str,
    economy: &EconomyConfig,
) -> Result<u64, StoreError> {
    let key = Key::Balance(username.to_string());
    match store.get(&key).await? {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(balance) => Ok(balance.min(economy.max_balance)),
            Err(e) => {
                warn!(%key, error = %e, "malformed balance, resetting");
                Ok(set_balance(store, username, economy.starting_balance as i64, economy).await)
            }
        },
        None => {
            info!(username, balance = economy.starting_balance, "new player");
            Ok(set_balance(store, username, economy.starting_balance as i64, economy).await)
        }
    }
}

/// Persist a clamped balance, surfacing store failures.
pub async fn write_balance<S: Store + ?Sized>(
    store: &S,
    username: &str,
    value: i64,
    economy: &EconomyConfig,
) -> Result<u64, StoreError> {
    let balance = clamp_balance(value, economy.max_balance);
    store
        .put(&Key::Balance(username.to_string()), &balance.to_string(), None)
        .await?;
    Ok(balance)
}

/// Persist a clamped balance. Failures are logged and the clamped value is
/// still returned.
pub async fn set_balance<S: Store + ?Sized>(
    store: &S,
    username: &str,
    value: i64,
    economy: &EconomyConfig,
) -> u64 {
    let balance = clamp_balance(value, economy.max_balance);
    if let Err(e) = write_balance(store, username, value, economy).await {
        warn!(username, balance, error = %e, "failed to persist balance");
    }
    balance
}

pub async fn get_bank<S: Store + ?Sized>(store: &S) -> i64 {
    match store.get(&Key::Bank).await {
        Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|e| {
            warn!(error = %e, "malformed bank balance");
            0
        }),
        Ok(None) => 0,
        Err(e) => {
            warn!(error = %e, "failed to read bank balance");
            0
        }
    }
}

/// Move the house ledger by `delta`. Uncapped and allowed to go negative.
pub async fn adjust_bank<S: Store + ?Sized>(
    store: &S,
    delta: i64,
    policy: &RetryPolicy,
) -> Option<i64> {
    if delta == 0 {
        return Some(get_bank(store).await);
    }
    let bank = mutate(store, &Key::Bank, None, policy, |current| {
        let previous: i64 = current.and_then(|raw| raw.trim().parse().ok()).unwrap_or(0);
        let next = previous.saturating_add(delta);
        Step::put(next.to_string(), next)
    })
    .await;
    match bank {
        Some(bank) => debug!(delta, bank, "bank updated"),
        None => warn!(delta, "bank update lost"),
    }
    bank
}

/// Milliseconds until `username` may spin again.
pub async fn cooldown_remaining<S: Store + ?Sized>(store: &S, username: &str, now_ms: u64) -> u64 {
    let key = Key::Cooldown(username.to_string());
    match store.get(&key).await {
        Ok(Some(raw)) => match raw.trim().parse::<u64>() {
            Ok(until) => until.saturating_sub(now_ms),
            Err(_) => {
                cleanup(store, &key, "malformed").await;
                0
            }
        },
        Ok(None) => 0,
        Err(e) => {
            warn!(%key, error = %e, "failed to read cooldown");
            0
        }
    }
}

pub async fn set_cooldown<S: Store + ?Sized>(
    store: &S,
    username: &str,
    now_ms: u64,
    cooldown_ms: u64,
) -> Option<u64> {
    if cooldown_ms == 0 {
        return None;
    }
    let key = Key::Cooldown(username.to_string());
    let until = now_ms.saturating_add(cooldown_ms);
    match store
        .put(&key, &until.to_string(), Some(Duration::from_millis(cooldown_ms)))
        .await
    {
        Ok(()) => Some(until),
        Err(e) => {
            warn!(%key, error = %e, "failed to set cooldown");
            None
        }
    }
}

/// Mark today's daily bonus as claimed. Returns `false` if it already was.
pub async fn claim_daily<S: Store + ?Sized>(
    store: &S,
    username: &str,
    day: &str,
    ttl: Duration,
    policy: &RetryPolicy,
) -> Result<bool, StoreError> {
    let key = Key::Daily(username.to_string());
    mutate(store, &key, Some(ttl), policy, |current| {
        if current == Some(day) {
            Step::Abort(false)
        } else {
            Step::put(day.to_string(), true)
        }
    })
    .await
    .ok_or_else(|| StoreError::Contended {
        key: key.to_string(),
        attempts: policy.max_attempts,
    })
}

/// Record a spin result. Returns the streak before and after.
pub async fn record_streak<S: Store + ?Sized>(
    store: &S,
    username: &str,
    won: bool,
    ttl: Duration,
    policy: &RetryPolicy,
) -> Option<(Streak, Streak)> {
    let key = Key::Streak(username.to_string());
    mutate(store, &key, Some(ttl), policy, |current| {
        let before = current
            .and_then(|raw| Streak::decode(raw).ok())
            .unwrap_or_default();
        let after = if won {
            Streak {
                wins: before.wins.saturating_add(1),
                losses: 0,
            }
        } else {
            Streak {
                wins: 0,
                losses: before.losses.saturating_add(1),
            }
        };
        Step::put(after.encode(), (before, after))
    })
    .await
}

pub async fn get_rank<S: Store + ?Sized>(store: &S, username: &str) -> Option<Rank> {
    let key = Key::Rank(username.to_string());
    match store.get(&key).await {
        Ok(Some(raw)) => match raw.parse() {
            Ok(rank) => Some(rank),
            Err(()) => {
                warn!(%key, %raw, "unknown rank");
                cleanup(store, &key, "malformed").await;
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(%key, error = %e, "failed to read rank");
            None
        }
    }
}

pub async fn set_rank<S: Store + ?Sized>(
    store: &S,
    username: &str,
    rank: Rank,
) -> Result<(), StoreError> {
    store
        .put(&Key::Rank(username.to_string()), rank.as_str(), None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{Faults, FaultyStore},
        state::Memory,
    };
    use dachsbau_types::casino::MAX_BALANCE;

    #[tokio::test]
    async fn test_new_player_gets_starting_balance() {
        let store = Memory::default();
        let economy = EconomyConfig::default();
        assert_eq!(get_balance(&store, "alice", &economy).await, Ok(100));
        assert_eq!(
            store.get(&Key::Balance("alice".into())).await.unwrap().as_deref(),
            Some("100")
        );
    }

    #[tokio::test]
    async fn test_set_balance_clamps() {
        let store = Memory::default();
        let economy = EconomyConfig::default();
        let key = Key::Balance("alice".into());

        assert_eq!(set_balance(&store, "alice", -5, &economy).await, 0);
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("0"));

        let over = MAX_BALANCE as i64 + 100;
        assert_eq!(set_balance(&store, "alice", over, &economy).await, MAX_BALANCE);
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(MAX_BALANCE.to_string())
        );
    }

    #[tokio::test]
    async fn test_set_balance_swallows_write_failure() {
        let store = FaultyStore::new(Memory::default());
        store.fail(
            "user:",
            Faults {
                put: true,
                ..Faults::default()
            },
        );
        let economy = EconomyConfig::default();
        assert_eq!(set_balance(&store, "alice", 42, &economy).await, 42);
        assert!(write_balance(&store, "alice", 42, &economy).await.is_err());
    }

    #[tokio::test]
    async fn test_balance_read_failure_propagates() {
        let store = FaultyStore::new(Memory::default());
        store.fail(
            "user:",
            Faults {
                get: true,
                ..Faults::default()
            },
        );
        assert!(get_balance(&store, "alice", &EconomyConfig::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_bank_goes_negative() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        assert_eq!(adjust_bank(&store, 10, &policy).await, Some(10));
        assert_eq!(adjust_bank(&store, -25, &policy).await, Some(-15));
        assert_eq!(get_bank(&store).await, -15);
    }

    #[tokio::test]
    async fn test_cooldown() {
        let store = Memory::default();
        assert_eq!(cooldown_remaining(&store, "alice", 1_000).await, 0);
        assert_eq!(set_cooldown(&store, "alice", 1_000, 30_000).await, Some(31_000));
        assert_eq!(cooldown_remaining(&store, "alice", 11_000).await, 20_000);
        assert_eq!(set_cooldown(&store, "alice", 1_000, 0).await, None);

        let key = Key::Cooldown("bob".into());
        store.put(&key, "soon", None).await.unwrap();
        assert_eq!(cooldown_remaining(&store, "bob", 1_000).await, 0);
        assert_eq!(store.get(&key).await, Ok(None));
    }

    #[tokio::test]
    async fn test_daily_once_per_day() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        let ttl = Duration::from_secs(60);
        assert_eq!(claim_daily(&store, "alice", "2024-01-03", ttl, &policy).await, Ok(true));
        assert_eq!(claim_daily(&store, "alice", "2024-01-03", ttl, &policy).await, Ok(false));
        assert_eq!(claim_daily(&store, "alice", "2024-01-04", ttl, &policy).await, Ok(true));
    }

    #[tokio::test]
    async fn test_streak_tracking() {
        let store = Memory::default();
        let policy = RetryPolicy::immediate(3);
        let ttl = Duration::from_secs(60);
        for _ in 0..5 {
            record_streak(&store, "alice", false, ttl, &policy).await;
        }
        let (before, after) = record_streak(&store, "alice", true, ttl, &policy)
            .await
            .unwrap();
        assert_eq!(before, Streak { wins: 0, losses: 5 });
        assert_eq!(after, Streak { wins: 1, losses: 0 });
    }

    #[tokio::test]
    async fn test_rank_roundtrip() {
        let store = Memory::default();
        assert_eq!(get_rank(&store, "alice").await, None);
        set_rank(&store, "alice", Rank::Gold).await.unwrap();
        assert_eq!(get_rank(&store, "alice").await, Some(Rank::Gold));

        store
            .put(&Key::Rank("bob".into()), "emperor", None)
            .await
            .unwrap();
        assert_eq!(get_rank(&store, "bob").await, None);
        assert_eq!(store.get(&Key::Rank("bob".into())).await.unwrap(), None);
    }
}
