use dachsbau_types::{
    api::{Consumable, Event, Rejection, Request, Response, Status},
    casino::{
        encode_grid, render_grid, BuffKind, BuffRecord, Grid, InstantEffect, ItemKind,
        ShopItem, Symbol, WheelSlot, JACKPOT_TTL_SECS,
    },
    config::Config,
    execution::Key,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    buffs::{
        activate_buff, active_buffs, add_insurance, consume_buff_use, grant_flag, has_flag,
        insurance_count, update_rage, use_insurance,
    },
    freespins::{add_free_spins, consume_free_spin, free_spins},
    jackpot,
    optimistic::{consume_flag, RetryPolicy},
    rng::RandomSource,
    slots::{calculate_win, GridEngine, Modifiers},
    state::{Clock, Store, StoreError},
    time::{day_key, week_start_ms},
    wallet::{
        adjust_bank, claim_daily, cooldown_remaining, get_balance, get_bank, get_rank,
        record_streak, set_balance, set_cooldown, set_rank, write_balance,
    },
    weekly::{increment_weekly, weekly_count},
};

mod handlers;

const GENERIC_FAILURE: &str = "Something went wrong, please try again in a moment.";

/// Request handler for one store, configuration and clock.
///
/// Holds no per-request state; every request reads what it needs from the
/// store and writes its effects back immediately.
pub struct Casino<'a, S: Store> {
    store: &'a S,
    config: &'a Config,
    clock: &'a dyn Clock,
    engine: GridEngine<'a>,
    retry: RetryPolicy,
}

impl<'a, S: Store> Casino<'a, S> {
    pub fn new(store: &'a S, config: &'a Config, clock: &'a dyn Clock) -> Self {
        Self {
            store,
            config,
            clock,
            engine: GridEngine::new(config),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    fn ttl(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    /// Dispatch a request. Never fails: store errors become a generic
    /// [Status::Failed] response.
    pub async fn handle<R: RandomSource + ?Sized>(
        &self,
        request: &Request,
        rng: &mut R,
    ) -> Response {
        let username = request.username.as_str();
        let arg = request.args.first().map(String::as_str);
        let result = match request.action.as_str() {
            "spin" | "slots" => self.handle_spin(username, arg, rng).await,
            "buy" => self.handle_buy(username, arg, rng).await,
            "balance" => self.handle_balance(username).await,
            "daily" => self.handle_daily(username).await,
            "shop" => Ok(self.handle_shop()),
            "buffs" => self.handle_buffs(username).await,
            "bank" => Ok(self.handle_bank().await),
            other => Ok(Rejection::UnknownAction(other.to_string()).into()),
        };
        match result {
            Ok(response) => {
                debug!(username, action = %request.action, status = ?response.status, "handled request");
                response
            }
            Err(e) => {
                warn!(username, action = %request.action, error = %e, "request failed");
                Response::failed(GENERIC_FAILURE)
            }
        }
    }

    /// Debit `price`, mirror it into the bank and return the new balance.
    async fn charge(&self, username: &str, balance: u64, price: u64, events: &mut Vec<Event>) -> u64 {
        let after = set_balance(
            self.store,
            username,
            balance as i64 - price as i64,
            &self.config.economy,
        )
        .await;
        events.push(Event::BalanceChanged {
            before: balance,
            after,
        });
        if price > 0 {
            adjust_bank(self.store, price as i64, &self.retry).await;
            events.push(Event::BankChanged {
                delta: price as i64,
            });
        }
        after
    }

    /// Pay `amount` out of the bank and return the new balance.
    async fn credit(&self, username: &str, balance: u64, amount: u64, events: &mut Vec<Event>) -> u64 {
        let after = set_balance(
            self.store,
            username,
            balance.saturating_add(amount) as i64,
            &self.config.economy,
        )
        .await;
        events.push(Event::BalanceChanged {
            before: balance,
            after,
        });
        if amount > 0 {
            adjust_bank(self.store, -(amount as i64), &self.retry).await;
            events.push(Event::BankChanged {
                delta: -(amount as i64),
            });
        }
        after
    }
}
