//! Hourly jackpot: one lucky second per hour, claimed by the first spin that
//! lands on or after it.

use crate::{
    rng::{GameRng, RandomSource},
    state::Store,
    time::{hour_slot, HourSlot},
};
use dachsbau_types::execution::Key;
use std::time::Duration;
use tracing::{info, warn};

const SECONDS_PER_HOUR: u64 = 3_600;

/// Second of the hour at which the jackpot for `slot` opens.
pub fn lucky_second(slot: &HourSlot) -> u32 {
    let seed = format!("dachsbau-jackpot-{}-{}-{}", slot.day, slot.month, slot.hour);
    GameRng::new(seed.as_bytes()).range_inclusive(0, SECONDS_PER_HOUR - 1) as u32
}

/// Try to claim the current hour's jackpot for `username`.
///
/// The claim key is written once per hour and verified after the write, so
/// at most one of two racing claimers sees itself as the winner.
pub async fn try_claim<S: Store + ?Sized>(
    store: &S,
    username: &str,
    now_ms: u64,
    utc_offset_minutes: i32,
    ttl: Duration,
) -> bool {
    let slot = hour_slot(now_ms, utc_offset_minutes);
    if slot.second_of_hour < lucky_second(&slot) {
        return false;
    }
    let key = Key::Jackpot {
        day: slot.day,
        month: slot.month,
        hour: slot.hour,
    };
    match store.get(&key).await {
        Ok(None) => {}
        Ok(Some(_)) => return false,
        Err(e) => {
            warn!(%key, error = %e, "failed to read jackpot claim");
            return false;
        }
    }
    if let Err(e) = store.put(&key, username, Some(ttl)).await {
        warn!(%key, error = %e, "failed to write jackpot claim");
        return false;
    }
    match store.get(&key).await {
        Ok(Some(winner)) if winner == username => {
            info!(%key, username, "hourly jackpot claimed");
            true
        }
        Ok(_) => false,
        Err(e) => {
            warn!(%key, error = %e, "failed to verify jackpot claim");
            false
        }
    }
}
