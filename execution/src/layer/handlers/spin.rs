use super::super::*;

/// Stake requested on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Stake {
    /// No argument: use a free spin if one is held, otherwise the base cost.
    Base,
    Fixed { amount: u64, unlock: Option<String> },
    AllIn { unlock: Option<String> },
}

impl Stake {
    fn unlock(&self) -> Option<&str> {
        match self {
            Stake::Base => None,
            Stake::Fixed { unlock, .. } | Stake::AllIn { unlock } => unlock.as_deref(),
        }
    }

    fn label(&self) -> String {
        match self {
            Stake::Base => String::new(),
            Stake::Fixed { amount, .. } => amount.to_string(),
            Stake::AllIn { .. } => "all".to_string(),
        }
    }
}

/// How a spin is paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Funding {
    Paid { stake: u64 },
    Free { multiplier: u32 },
}

impl Funding {
    fn cost(&self) -> u64 {
        match *self {
            Funding::Paid { stake } => stake,
            Funding::Free { .. } => 0,
        }
    }

    /// Scale base-stake points to this spin.
    fn scale(&self, points: u64, base_cost: u64) -> u64 {
        match *self {
            Funding::Paid { stake } => points.saturating_mul(stake) / base_cost.max(1),
            Funding::Free { multiplier } => points.saturating_mul(multiplier as u64),
        }
    }

    /// Multiplier attached to free spins won on this spin.
    fn multiplier(&self, base_cost: u64) -> u32 {
        match *self {
            Funding::Paid { stake } => (stake / base_cost.max(1)).clamp(1, u32::MAX as u64) as u32,
            Funding::Free { multiplier } => multiplier,
        }
    }
}

impl<'a, S: Store> Casino<'a, S> {
    fn parse_stake(&self, arg: Option<&str>) -> Result<Stake, Rejection> {
        let economy = &self.config.economy;
        let Some(raw) = arg else {
            return Ok(Stake::Base);
        };
        if raw.eq_ignore_ascii_case("all") {
            return Ok(Stake::AllIn {
                unlock: economy.all_in_unlock.clone(),
            });
        }
        raw.parse::<u64>()
            .ok()
            .and_then(|amount| economy.stakes.iter().find(|tier| tier.amount == amount))
            .map(|tier| Stake::Fixed {
                amount: tier.amount,
                unlock: tier.unlock.clone(),
            })
            .ok_or_else(|| Rejection::InvalidStake(raw.to_string()))
    }

    /// Consume the first held boost matching a symbol on the grid.
    async fn take_symbol_boost(&self, username: &str, grid: &Grid) -> Option<Symbol> {
        let mut seen = Vec::with_capacity(3);
        for symbol in grid.iter().copied().filter(|s| !s.is_wild()) {
            if seen.contains(&symbol) {
                continue;
            }
            seen.push(symbol);
            let key = Key::SymbolBoost(username.to_string(), symbol);
            if consume_flag(self.store, &key).await {
                return Some(symbol);
            }
        }
        None
    }

    pub(in crate::layer) async fn handle_spin<R: RandomSource + ?Sized>(
        &self,
        username: &str,
        arg: Option<&str>,
        rng: &mut R,
    ) -> Result<Response, StoreError> {
        let now = self.now();
        let economy = &self.config.economy;
        let m = &self.config.modifiers;

        let stake = match self.parse_stake(arg) {
            Ok(stake) => stake,
            Err(rejection) => return Ok(rejection.into()),
        };

        // Everything the spin depends on is independent, so read it at once
        let unlock_key = stake
            .unlock()
            .map(|unlock| Key::Unlock(username.to_string(), unlock.to_string()));
        let (balance, cooldown, buffs, unlocked, ledger) = futures::join!(
            get_balance(self.store, username, economy),
            cooldown_remaining(self.store, username, now),
            active_buffs(self.store, username, now),
            async {
                match &unlock_key {
                    Some(key) => has_flag(self.store, key).await,
                    None => true,
                }
            },
            free_spins(self.store, username),
        );
        let balance = balance?;

        if cooldown > 0 {
            return Ok(Rejection::Cooldown {
                remaining_secs: cooldown.div_ceil(1_000),
            }
            .into());
        }
        if !unlocked {
            return Ok(Rejection::StakeLocked {
                stake: stake.label(),
                unlock: stake.unlock().unwrap_or_default().to_string(),
            }
            .into());
        }

        let funding = match &stake {
            Stake::Base if !ledger.is_empty() => {
                match consume_free_spin(
                    self.store,
                    username,
                    Self::ttl(economy.free_spins_ttl_secs),
                    &self.retry,
                )
                .await
                {
                    Some(multiplier) => Funding::Free { multiplier },
                    None => Funding::Paid {
                        stake: economy.base_cost,
                    },
                }
            }
            Stake::Base => Funding::Paid {
                stake: economy.base_cost,
            },
            Stake::Fixed { amount, .. } => Funding::Paid { stake: *amount },
            Stake::AllIn { .. } => Funding::Paid { stake: balance },
        };
        let cost = funding.cost();
        if let Funding::Paid { stake } = funding {
            let required = stake.max(economy.base_cost);
            if balance < required {
                return Ok(Rejection::InsufficientBalance { balance, required }.into());
            }
        }

        let mut events = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        if let Funding::Free { multiplier } = funding {
            events.push(Event::Consumed {
                item: Consumable::FreeSpin { multiplier },
            });
            notes.push(format!("🎟️ Free spin (×{multiplier})"));
        }

        let modifiers = Modifiers::from_buffs(&buffs);
        let spin = self.engine.next(self.store, username, &modifiers, rng).await;
        events.extend(spin.consumed.iter().map(|item| Event::Consumed { item: *item }));
        let win = calculate_win(&spin.grid, &self.config.payouts, rng);
        let won = win.is_win();
        let mut points = funding.scale(win.points, economy.base_cost);

        if points > 0 {
            if let Some(symbol) = self.take_symbol_boost(username, &spin.grid).await {
                points = points.saturating_mul(m.symbol_boost_multiplier);
                events.push(Event::Consumed {
                    item: Consumable::SymbolBoost(symbol),
                });
                notes.push(format!("{symbol} Boost ×{}", m.symbol_boost_multiplier));
            }
            if buffs.contains_key(&BuffKind::GoldenHour) {
                points = points.saturating_add(points.saturating_mul(m.golden_hour_percent) / 100);
                notes.push(format!("🌅 Golden Hour +{}%", m.golden_hour_percent));
            }
            if consume_flag(self.store, &Key::WinMultiplier(username.to_string())).await {
                points = points.saturating_mul(m.win_multiplier);
                events.push(Event::Consumed {
                    item: Consumable::WinMultiplier,
                });
                notes.push(format!("✖️ Win Multiplier ×{}", m.win_multiplier));
            }
        }

        let mut refund = 0;
        if !won && cost > 0 && use_insurance(self.store, username, &self.retry).await {
            refund = cost.saturating_mul(m.insurance_refund_percent) / 100;
            events.push(Event::Consumed {
                item: Consumable::Insurance,
            });
            events.push(Event::Refunded { amount: refund });
            notes.push(format!("🛡️ Insurance refunds {refund}"));
        }

        if buffs.contains_key(&BuffKind::RageMode) {
            if let Some(stack) =
                update_rage(self.store, username, won, m.rage_step, m.rage_max, now, &self.retry).await
            {
                notes.push(format!("🔥 Rage {stack}%"));
            }
        }
        if buffs.contains_key(&BuffKind::DachsLocator)
            && consume_buff_use(self.store, username, BuffKind::DachsLocator, now, &self.retry).await
        {
            events.push(Event::Consumed {
                item: Consumable::LocatorUse,
            });
        }

        let mut bonus = 0u64;
        if let Some((before, after)) = record_streak(
            self.store,
            username,
            won,
            Self::ttl(economy.streak_ttl_secs),
            &self.retry,
        )
        .await
        {
            let streak_bonus = if won && after.wins == m.hot_streak_wins {
                notes.push(format!("🔥 Hot streak! +{}", m.hot_streak_bonus));
                m.hot_streak_bonus
            } else if won && before.losses >= m.comeback_losses {
                notes.push(format!("💪 Comeback! +{}", m.comeback_bonus));
                m.comeback_bonus
            } else {
                0
            };
            if streak_bonus > 0 {
                bonus += streak_bonus;
                events.push(Event::StreakBonus {
                    amount: streak_bonus,
                });
            }
        }

        if win.free_spins > 0 {
            let multiplier = funding.multiplier(economy.base_cost);
            match add_free_spins(
                self.store,
                username,
                multiplier,
                win.free_spins,
                Self::ttl(economy.free_spins_ttl_secs),
                &self.retry,
            )
            .await
            {
                Some(_) => events.push(Event::FreeSpinsGranted {
                    multiplier,
                    count: win.free_spins,
                }),
                None => warn!(username, "free spin grant lost"),
            }
        }

        if economy.jackpot_bonus > 0
            && jackpot::try_claim(
                self.store,
                username,
                now,
                economy.utc_offset_minutes,
                Self::ttl(JACKPOT_TTL_SECS),
            )
            .await
        {
            bonus = bonus.saturating_add(economy.jackpot_bonus);
            events.push(Event::JackpotClaimed {
                amount: economy.jackpot_bonus,
            });
            notes.push(format!("⏰ Hourly jackpot! +{}", economy.jackpot_bonus));
        }

        let payout = points.saturating_add(refund).saturating_add(bonus);
        let after = set_balance(
            self.store,
            username,
            balance as i64 - cost as i64 + payout as i64,
            economy,
        )
        .await;
        events.push(Event::BalanceChanged {
            before: balance,
            after,
        });
        let delta = cost as i64 - payout as i64;
        if delta != 0 {
            adjust_bank(self.store, delta, &self.retry).await;
            events.push(Event::BankChanged { delta });
        }
        if let Some(until) = set_cooldown(self.store, username, now, economy.cooldown_ms).await {
            events.push(Event::CooldownSet { until });
        }
        events.insert(
            0,
            Event::Spun {
                grid: spin.grid,
                points,
            },
        );
        info!(username, cost, points, payout, balance = after, "spin");

        let mut message = format!("🎰 {} 🎰\n{}", render_grid(&spin.grid), win.message);
        if points > 0 {
            message.push_str(&format!("\n+{points} DachsTaler"));
        }
        if !notes.is_empty() {
            message.push('\n');
            message.push_str(&notes.join(" · "));
        }
        message.push_str(&format!("\n💰 {after}"));
        Ok(Response::ok(message, events))
    }
}
