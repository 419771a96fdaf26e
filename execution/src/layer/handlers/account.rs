use super::super::*;

fn minutes_left(expire_at: u64, now: u64) -> u64 {
    expire_at.saturating_sub(now).div_ceil(60_000)
}

impl<'a, S: Store> Casino<'a, S> {
    pub(in crate::layer) async fn handle_balance(&self, username: &str) -> Result<Response, StoreError> {
        let (balance, rank, ledger) = futures::join!(
            get_balance(self.store, username, &self.config.economy),
            get_rank(self.store, username),
            free_spins(self.store, username),
        );
        let balance = balance?;
        let mut message = format!("💰 {username}: {balance} DachsTaler");
        if let Some(rank) = rank {
            message.push_str(&format!(" · {rank}"));
        }
        if !ledger.is_empty() {
            message.push_str(&format!(" · 🎟️ {} free spins", ledger.total()));
        }
        Ok(Response::ok(message, Vec::new()))
    }

    pub(in crate::layer) async fn handle_daily(&self, username: &str) -> Result<Response, StoreError> {
        let economy = &self.config.economy;
        let day = day_key(self.now(), economy.utc_offset_minutes);
        let balance = get_balance(self.store, username, economy).await?;
        let claimed = claim_daily(
            self.store,
            username,
            &day,
            Self::ttl(economy.daily_ttl_secs),
            &self.retry,
        )
        .await?;
        if !claimed {
            return Ok(Rejection::DailyAlreadyClaimed.into());
        }

        let mut events = Vec::new();
        let after = self
            .credit(username, balance, economy.daily_bonus, &mut events)
            .await;
        events.push(Event::DailyClaimed {
            amount: economy.daily_bonus,
        });
        info!(username, %day, bonus = economy.daily_bonus, "daily bonus");
        Ok(Response::ok(
            format!("🎁 Daily bonus: +{} DachsTaler · 💰 {after}", economy.daily_bonus),
            events,
        ))
    }

    pub(in crate::layer) fn handle_shop(&self) -> Response {
        let lines: Vec<String> = self
            .config
            .shop
            .iter()
            .map(|item| format!("#{} {} ({})", item.id, item.name, item.price))
            .collect();
        Response::ok(format!("🛒 Shop:\n{}", lines.join("\n")), Vec::new())
    }

    pub(in crate::layer) async fn handle_buffs(&self, username: &str) -> Result<Response, StoreError> {
        let now = self.now();
        let user = username.to_string();
        let flags = [
            (Key::WinMultiplier(user.clone()), "✖️ Win Multiplier"),
            (Key::GuaranteedPair(user.clone()), "🎯 Guaranteed Pair"),
            (Key::WildCard(user.clone()), "🃏 Wild Card"),
            (Key::Peek(user.clone()), "🔮 Peek"),
        ];
        let boosts: Vec<(Symbol, Key)> = Symbol::ALL
            .into_iter()
            .filter(|symbol| !symbol.is_wild())
            .map(|symbol| (symbol, Key::SymbolBoost(user.clone(), symbol)))
            .collect();

        let (buffs, insurance, ledger, held_flags, held_boosts) = futures::join!(
            active_buffs(self.store, username, now),
            insurance_count(self.store, username),
            free_spins(self.store, username),
            futures::future::join_all(flags.iter().map(|(key, _)| has_flag(self.store, key))),
            futures::future::join_all(boosts.iter().map(|(_, key)| has_flag(self.store, key))),
        );

        let mut lines = Vec::new();
        for (kind, record) in &buffs {
            let minutes = minutes_left(record.expire_at(), now);
            let detail = match *record {
                BuffRecord::Simple { .. } => String::new(),
                BuffRecord::Uses { uses, .. } => format!(", {uses} spins"),
                BuffRecord::Stack { stack, .. } => format!(", {stack}%"),
            };
            lines.push(format!("{} ({minutes} min{detail})", kind.label()));
        }
        if insurance > 0 {
            lines.push(format!("🛡️ Insurance ×{insurance}"));
        }
        if !ledger.is_empty() {
            let buckets: Vec<String> = ledger
                .buckets
                .iter()
                .map(|bucket| format!("{}×{}", bucket.count, bucket.multiplier))
                .collect();
            lines.push(format!("🎟️ Free spins {}", buckets.join(", ")));
        }
        lines.extend(
            flags
                .iter()
                .zip(held_flags)
                .filter(|(_, held)| *held)
                .map(|((_, label), _)| label.to_string()),
        );
        lines.extend(
            boosts
                .iter()
                .zip(held_boosts)
                .filter(|(_, held)| *held)
                .map(|((symbol, _), _)| format!("{symbol} Boost")),
        );

        if lines.is_empty() {
            return Ok(Response::ok("No active buffs.", Vec::new()));
        }
        Ok(Response::ok(
            format!("✨ Active for {username}:\n{}", lines.join("\n")),
            Vec::new(),
        ))
    }

    pub(in crate::layer) async fn handle_bank(&self) -> Response {
        let bank = get_bank(self.store).await;
        Response::ok(format!("🏦 Dachsbau bank: {bank} DachsTaler"), Vec::new())
    }
}
