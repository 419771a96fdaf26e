//! Free-spin ledger persistence.

use crate::{
    buffs::cleanup,
    optimistic::{mutate, RetryPolicy, Step},
    state::Store,
};
use dachsbau_types::{casino::FreeSpinLedger, execution::Key};
use std::time::Duration;
use tracing::warn;

fn decode(raw: Option<&str>) -> FreeSpinLedger {
    raw.and_then(|raw| FreeSpinLedger::decode(raw).ok())
        .unwrap_or_default()
}

pub async fn free_spins<S: Store + ?Sized>(store: &S, username: &str) -> FreeSpinLedger {
    let key = Key::FreeSpins(username.to_string());
    match store.get(&key).await {
        Ok(Some(raw)) => match FreeSpinLedger::decode(&raw) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(%key, error = %e, "malformed free-spin ledger");
                cleanup(store, &key, "malformed").await;
                FreeSpinLedger::default()
            }
        },
        Ok(None) => FreeSpinLedger::default(),
        Err(e) => {
            warn!(%key, error = %e, "failed to read free spins");
            FreeSpinLedger::default()
        }
    }
}

/// Credit `count` spins at `multiplier`. Returns the new total, or `None`
/// when the write kept losing races.
pub async fn add_free_spins<S: Store + ?Sized>(
    store: &S,
    username: &str,
    multiplier: u32,
    count: u32,
    ttl: Duration,
    policy: &RetryPolicy,
) -> Option<u32> {
    let key = Key::FreeSpins(username.to_string());
    mutate(store, &key, Some(ttl), policy, |current| {
        let mut ledger = decode(current);
        ledger.add(multiplier, count);
        let total = ledger.total();
        Step::put(ledger.encode(), total)
    })
    .await
}

/// Take one spin from the lowest-multiplier bucket and return its multiplier.
pub async fn consume_free_spin<S: Store + ?Sized>(
    store: &S,
    username: &str,
    ttl: Duration,
    policy: &RetryPolicy,
) -> Option<u32> {
    let key = Key::FreeSpins(username.to_string());
    mutate(store, &key, Some(ttl), policy, |current| {
        let mut ledger = decode(current);
        match ledger.consume() {
            None => Step::Abort(None),
            Some(multiplier) if ledger.is_empty() => Step::delete(Some(multiplier)),
            Some(multiplier) => Step::put(ledger.encode(), Some(multiplier)),
        }
    })
    .await
    .flatten()
}
