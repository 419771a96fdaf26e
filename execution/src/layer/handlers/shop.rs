use super::super::*;

/// Weighted pick over the prize wheel.
fn spin_wheel<'w, R: RandomSource + ?Sized>(
    wheel: &'w [WheelSlot],
    rng: &mut R,
) -> Option<&'w WheelSlot> {
    let total: u64 = wheel.iter().map(|slot| slot.weight as u64).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.range_inclusive(0, total - 1);
    for slot in wheel {
        let weight = slot.weight as u64;
        if roll < weight {
            return Some(slot);
        }
        roll -= weight;
    }
    None
}

impl<'a, S: Store> Casino<'a, S> {
    /// Validation that depends on stored state, run before any money moves.
    async fn check_purchase(&self, username: &str, item: &ShopItem, now: u64) -> Result<(), Rejection> {
        let user = username.to_string();
        let week = week_start_ms(now, self.config.economy.utc_offset_minutes);
        match &item.kind {
            ItemKind::Prestige { rank, requires } => {
                let current = get_rank(self.store, username).await;
                if let Some(current) = current.filter(|current| current >= rank) {
                    return Err(Rejection::RankNotHigher {
                        current,
                        target: *rank,
                    });
                }
                if let Some(required) = requires {
                    if !current.is_some_and(|current| current >= *required) {
                        return Err(Rejection::MissingRank(*required));
                    }
                }
                Ok(())
            }
            ItemKind::Unlock { unlock, requires } => {
                let required_key = requires
                    .as_ref()
                    .map(|required| Key::Unlock(user.clone(), required.clone()));
                let unlock_key = Key::Unlock(user.clone(), unlock.clone());
                let (has_required, already) = futures::join!(
                    async {
                        match &required_key {
                            Some(key) => has_flag(self.store, key).await,
                            None => true,
                        }
                    },
                    has_flag(self.store, &unlock_key),
                );
                if !has_required {
                    return Err(Rejection::MissingUnlock(
                        requires.clone().unwrap_or_default(),
                    ));
                }
                if already {
                    return Err(Rejection::AlreadyUnlocked(unlock.clone()));
                }
                Ok(())
            }
            ItemKind::SymbolBoost {
                symbol,
                weekly_limit: Some(limit),
            } => {
                let boost_key = Key::SymbolBoost(user.clone(), *symbol);
                let (held, bought) = futures::join!(
                    has_flag(self.store, &boost_key),
                    weekly_count(self.store, username, item.id, week),
                );
                if held {
                    return Err(Rejection::BoostAlreadyHeld(*symbol));
                }
                if bought >= *limit {
                    return Err(Rejection::WeeklyLimit { limit: *limit });
                }
                Ok(())
            }
            ItemKind::SpinBundle { weekly_limit, .. } => {
                if weekly_count(self.store, username, item.id, week).await >= *weekly_limit {
                    return Err(Rejection::WeeklyLimit {
                        limit: *weekly_limit,
                    });
                }
                Ok(())
            }
            ItemKind::WinMultiplier => self.ensure_absent(&Key::WinMultiplier(user)).await,
            ItemKind::PeekToken => self.ensure_absent(&Key::Peek(user)).await,
            ItemKind::Instant(InstantEffect::GuaranteedPair) => {
                self.ensure_absent(&Key::GuaranteedPair(user)).await
            }
            ItemKind::Instant(InstantEffect::WildCard) => {
                self.ensure_absent(&Key::WildCard(user)).await
            }
            ItemKind::TimedBuff { .. }
            | ItemKind::SymbolBoost {
                weekly_limit: None,
                ..
            }
            | ItemKind::Insurance { .. }
            | ItemKind::Instant(_) => Ok(()),
        }
    }

    /// Bump a weekly purchase counter. The purchase stands even when the
    /// counter update is lost.
    async fn count_weekly(&self, username: &str, item_id: u32, week: u64) {
        let counted = increment_weekly(
            self.store,
            username,
            item_id,
            week,
            Self::ttl(self.config.economy.weekly_ttl_secs),
            &self.retry,
        )
        .await;
        if counted.is_none() {
            warn!(username, item_id, "weekly purchase count lost");
        }
    }

    async fn grant_free_spins(&self, username: &str, count: u32) {
        let total = add_free_spins(
            self.store,
            username,
            1,
            count,
            Self::ttl(self.config.economy.free_spins_ttl_secs),
            &self.retry,
        )
        .await;
        if total.is_none() {
            warn!(username, count, "free spin grant lost");
        }
    }

    async fn ensure_absent(&self, key: &Key) -> Result<(), Rejection> {
        if has_flag(self.store, key).await {
            Err(Rejection::AlreadyActive)
        } else {
            Ok(())
        }
    }

    /// Hand over an item that lives in the store: buffs, boosts, insurance
    /// and one-shot tokens. Also used for mystery-box prizes.
    async fn grant(
        &self,
        username: &str,
        item: &ShopItem,
        now: u64,
    ) -> Result<(Vec<Event>, String), StoreError> {
        let user = username.to_string();
        let flag_ttl = Some(Self::ttl(self.config.economy.flag_ttl_secs));
        match &item.kind {
            ItemKind::TimedBuff {
                buff,
                duration_secs,
                uses,
            } => {
                let record = activate_buff(
                    self.store,
                    username,
                    *buff,
                    Self::ttl(*duration_secs),
                    *uses,
                    now,
                )
                .await?;
                let mut text = format!("{} active for {} min", buff.label(), duration_secs / 60);
                if let BuffRecord::Uses { uses, .. } = record {
                    text.push_str(&format!(" ({uses} spins)"));
                }
                Ok((
                    vec![Event::BuffActivated {
                        buff: *buff,
                        expire_at: record.expire_at(),
                    }],
                    text,
                ))
            }
            ItemKind::SymbolBoost { symbol, .. } => {
                grant_flag(self.store, &Key::SymbolBoost(user, *symbol), flag_ttl).await?;
                Ok((
                    vec![Event::FlagGranted { item_id: item.id }],
                    format!("{symbol} boost ready for your next win"),
                ))
            }
            ItemKind::Insurance { count } => {
                let text = match add_insurance(self.store, username, *count, &self.retry).await {
                    Some(total) => format!("🛡️ {total} insurance charges"),
                    None => {
                        warn!(username, count, "insurance grant lost");
                        format!("🛡️ +{count} insurance charges")
                    }
                };
                Ok((vec![Event::InsuranceGranted { count: *count }], text))
            }
            ItemKind::WinMultiplier => {
                grant_flag(self.store, &Key::WinMultiplier(user), flag_ttl).await?;
                Ok((
                    vec![Event::FlagGranted { item_id: item.id }],
                    "✖️ Your next win counts double".to_string(),
                ))
            }
            ItemKind::Instant(InstantEffect::GuaranteedPair) => {
                grant_flag(self.store, &Key::GuaranteedPair(user), flag_ttl).await?;
                Ok((
                    vec![Event::FlagGranted { item_id: item.id }],
                    "🎯 Your next spin will have a pair".to_string(),
                ))
            }
            ItemKind::Instant(InstantEffect::WildCard) => {
                grant_flag(self.store, &Key::WildCard(user), flag_ttl).await?;
                Ok((
                    vec![Event::FlagGranted { item_id: item.id }],
                    "🃏 A wild joins your next spin".to_string(),
                ))
            }
            ItemKind::Prestige { .. }
            | ItemKind::Unlock { .. }
            | ItemKind::SpinBundle { .. }
            | ItemKind::PeekToken
            | ItemKind::Instant(_) => Ok((Vec::new(), item.name.clone())),
        }
    }

    pub(in crate::layer) async fn handle_buy<R: RandomSource + ?Sized>(
        &self,
        username: &str,
        arg: Option<&str>,
        rng: &mut R,
    ) -> Result<Response, StoreError> {
        let raw = arg.unwrap_or_default();
        let Some(item) = raw
            .trim_start_matches('#')
            .parse::<u32>()
            .ok()
            .and_then(|id| self.config.item(id))
        else {
            return Ok(Rejection::UnknownItem(raw.to_string()).into());
        };

        let now = self.now();
        let (balance, verdict) = futures::join!(
            get_balance(self.store, username, &self.config.economy),
            self.check_purchase(username, item, now),
        );
        let balance = balance?;
        if let Err(rejection) = verdict {
            return Ok(rejection.into());
        }
        if balance < item.price {
            return Ok(Rejection::InsufficientBalance {
                balance,
                required: item.price,
            }
            .into());
        }
        info!(username, item = item.id, price = item.price, "purchase");

        let economy = &self.config.economy;
        let week = week_start_ms(now, economy.utc_offset_minutes);
        let mut events = Vec::new();
        let message = match &item.kind {
            ItemKind::Prestige { rank, .. } => {
                set_rank(self.store, username, *rank).await?;
                self.charge(username, balance, item.price, &mut events).await;
                events.push(Event::RankAdvanced { rank: *rank });
                format!("{} You are now {rank}!", item.name)
            }
            ItemKind::Unlock { unlock, .. } => {
                grant_flag(
                    self.store,
                    &Key::Unlock(username.to_string(), unlock.clone()),
                    None,
                )
                .await?;
                self.charge(username, balance, item.price, &mut events).await;
                events.push(Event::Unlocked {
                    unlock: unlock.clone(),
                });
                format!("🔓 {} unlocked!", item.name)
            }
            ItemKind::TimedBuff { .. }
            | ItemKind::Insurance { .. }
            | ItemKind::WinMultiplier
            | ItemKind::Instant(InstantEffect::GuaranteedPair)
            | ItemKind::Instant(InstantEffect::WildCard) => {
                self.charge(username, balance, item.price, &mut events).await;
                let (granted, text) = self.grant(username, item, now).await?;
                events.extend(granted);
                text
            }
            ItemKind::SymbolBoost { weekly_limit, .. } => {
                self.charge(username, balance, item.price, &mut events).await;
                let (granted, text) = self.grant(username, item, now).await?;
                events.extend(granted);
                if weekly_limit.is_some() {
                    self.count_weekly(username, item.id, week).await;
                }
                text
            }
            ItemKind::SpinBundle { spins, .. } => {
                self.charge(username, balance, item.price, &mut events).await;
                self.grant_free_spins(username, *spins).await;
                self.count_weekly(username, item.id, week).await;
                events.push(Event::FreeSpinsGranted {
                    multiplier: 1,
                    count: *spins,
                });
                format!("🎰 {spins} free spins added")
            }
            ItemKind::PeekToken => {
                self.charge(username, balance, item.price, &mut events).await;
                let wins = self.store_peek(username, now, rng, &mut events).await?;
                if wins {
                    "🔮 The crystal ball glows: your next spin wins!".to_string()
                } else {
                    "🔮 The crystal ball stays dark: your next spin loses.".to_string()
                }
            }
            ItemKind::Instant(InstantEffect::MysteryBox) => {
                return self.open_mystery_box(username, item, balance, now, rng).await;
            }
            ItemKind::Instant(InstantEffect::ChaosSpin { min, max })
            | ItemKind::Instant(InstantEffect::ReverseChaos { min, max }) => {
                let after = self.charge(username, balance, item.price, &mut events).await;
                let amount = rng.range_inclusive(*min, *max);
                self.credit(username, after, amount, &mut events).await;
                format!("{}: you get {amount} DachsTaler!", item.name)
            }
            ItemKind::Instant(InstantEffect::Wheel) => {
                let after = self.charge(username, balance, item.price, &mut events).await;
                match spin_wheel(&self.config.wheel, rng) {
                    Some(slot) => {
                        self.credit(username, after, slot.prize, &mut events).await;
                        format!("🎡 {}: {} DachsTaler", slot.label, slot.prize)
                    }
                    None => "🎡 The wheel is empty.".to_string(),
                }
            }
            ItemKind::Instant(InstantEffect::DiamondMine {
                min_spins,
                max_spins,
            }) => {
                self.charge(username, balance, item.price, &mut events).await;
                let spins = rng.range_inclusive(*min_spins as u64, *max_spins as u64) as u32;
                self.grant_free_spins(username, spins).await;
                events.push(Event::FreeSpinsGranted {
                    multiplier: 1,
                    count: spins,
                });
                format!("⛏️ You dug up {spins} free spins!")
            }
        };
        Ok(Response::ok(message, events))
    }

    /// Generate the next grid exactly the way a spin would and park it.
    async fn store_peek<R: RandomSource + ?Sized>(
        &self,
        username: &str,
        now: u64,
        rng: &mut R,
        events: &mut Vec<Event>,
    ) -> Result<bool, StoreError> {
        let buffs = active_buffs(self.store, username, now).await;
        let modifiers = Modifiers::from_buffs(&buffs);
        let spin = self.engine.produce(self.store, username, &modifiers, rng).await;
        events.extend(spin.consumed.iter().map(|item| Event::Consumed { item: *item }));
        let wins = calculate_win(&spin.grid, &self.config.payouts, rng).is_win();
        self.store
            .put(
                &Key::Peek(username.to_string()),
                &encode_grid(&spin.grid),
                Some(Self::ttl(self.config.economy.peek_ttl_secs)),
            )
            .await?;
        events.push(Event::PeekStored { wins });
        Ok(wins)
    }

    /// Debit, grant a random pool item, and undo the debit if granting fails.
    ///
    /// No lock is held between the debit and a rollback, so two overlapping
    /// purchases by the same user can interleave.
    async fn open_mystery_box<R: RandomSource + ?Sized>(
        &self,
        username: &str,
        item: &ShopItem,
        balance: u64,
        now: u64,
        rng: &mut R,
    ) -> Result<Response, StoreError> {
        let mut events = Vec::new();
        let after = self.charge(username, balance, item.price, &mut events).await;

        let pool = &self.config.mystery_box_pool;
        let prize = pool
            .get(rng.index(pool.len()))
            .and_then(|id| self.config.item(*id));
        let granted = match prize {
            Some(prize) => self
                .grant(username, prize, now)
                .await
                .map(|granted| Some((prize, granted))),
            None => Ok(None),
        };

        match granted {
            Ok(Some((prize, (granted, text)))) => {
                events.extend(granted);
                Ok(Response::ok(
                    format!("🎁 Mystery Box: {}! {text}", prize.name),
                    events,
                ))
            }
            outcome => {
                if let Err(e) = &outcome {
                    warn!(username, error = %e, "mystery box activation failed, rolling back");
                } else {
                    warn!(username, "mystery box pool has no grantable item, rolling back");
                }
                let restored = write_balance(self.store, username, balance as i64, &self.config.economy).await;
                let reversed = adjust_bank(self.store, -(item.price as i64), &self.retry).await;
                let message = match (&restored, reversed) {
                    (Ok(_), Some(_)) => {
                        info!(username, price = item.price, "mystery box rolled back");
                        events.push(Event::BalanceChanged {
                            before: after,
                            after: balance,
                        });
                        events.push(Event::BankChanged {
                            delta: -(item.price as i64),
                        });
                        events.push(Event::Refunded { amount: item.price });
                        format!(
                            "🎁 The Mystery Box jammed. Your {} DachsTaler have been refunded.",
                            item.price
                        )
                    }
                    _ => {
                        error!(
                            username,
                            price = item.price,
                            balance_restored = restored.is_ok(),
                            bank_restored = reversed.is_some(),
                            "mystery box rollback failed, manual correction required"
                        );
                        format!(
                            "🎁 The Mystery Box jammed. Please contact a moderator to claim your refund of {} DachsTaler.",
                            item.price
                        )
                    }
                };
                Ok(Response {
                    status: Status::Failed,
                    message,
                    events,
                })
            }
        }
    }
}
