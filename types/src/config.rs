//! Static economy configuration.
//!
//! A [Config] is loaded once at start-up (or built from [Config::default]) and
//! passed by reference into the execution engine. Nothing mutates it after
//! [Config::validate] succeeds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::casino::{
    default_catalog, default_mystery_box_pool, default_wheel, InstantEffect, ItemKind, ShopItem,
    Symbol, WheelSlot, BASE_SPIN_COST, COOLDOWN_MS, DACHS_BASE_CHANCE, DACHS_PAIR_PAYOUT,
    DACHS_SINGLE_PAYOUT, DACHS_TRIPLE_PAYOUT, DAILY_BONUS, DAILY_TTL_SECS,
    DEFAULT_UTC_OFFSET_MINUTES, FLAG_TTL_SECS, FREE_SPINS_PAIR_DIAMOND, FREE_SPINS_TRIPLE_DIAMOND,
    FREE_SPINS_TTL_SECS, HOURLY_JACKPOT_BONUS, MAX_BALANCE, MAX_STACK, PEEK_TTL_SECS,
    RETRY_BASE_DELAY_MS, RETRY_MAX_ATTEMPTS, STARTING_BALANCE, STREAK_TTL_SECS, WEEKLY_TTL_SECS,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("symbol weights must be non-empty with a positive total")]
    EmptyWeights,
    #[error("{0} cannot appear in the weighted symbol table")]
    UnweightableSymbol(Symbol),
    #[error("{field} must be within [0, 1] (got {value})")]
    InvalidProbability { field: &'static str, value: String },
    #[error("{field} must be > 0")]
    InvalidNonZero { field: &'static str },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("starting balance {starting} exceeds max balance {max}")]
    StartingAboveMax { starting: u64, max: u64 },
    #[error("stake {0} is below the base spin cost")]
    StakeBelowBase(u64),
    #[error("duplicate shop item id {0}")]
    DuplicateItem(u32),
    #[error("item {item} requires unknown {what} {value}")]
    UnknownPrerequisite {
        item: u32,
        what: &'static str,
        value: String,
    },
    #[error("mystery box pool references item {0} which cannot be granted")]
    InvalidPoolItem(u32),
    #[error("item {0} has an inverted range")]
    InvertedRange(u32),
    #[error("rage max {0} exceeds the stack ceiling")]
    RageMaxTooHigh(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedSymbol {
    pub symbol: Symbol,
    pub weight: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolConfig {
    /// Categorical distribution over regular symbols, in table order.
    pub weights: Vec<WeightedSymbol>,
    /// Independent per-cell chance of the rare symbol.
    pub dachs_chance: f64,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        let weights = [
            (Symbol::Cherry, 16),
            (Symbol::Lemon, 14),
            (Symbol::Orange, 12),
            (Symbol::Grapes, 10),
            (Symbol::Watermelon, 8),
            (Symbol::Star, 5),
            (Symbol::Diamond, 5),
        ]
        .into_iter()
        .map(|(symbol, weight)| WeightedSymbol { symbol, weight })
        .collect();
        Self {
            weights,
            dachs_chance: DACHS_BASE_CHANCE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    pub dachs_triple: u64,
    pub dachs_pair: u64,
    pub dachs_single: u64,
    pub triples: BTreeMap<Symbol, u64>,
    pub pairs: BTreeMap<Symbol, u64>,
    pub default_triple: u64,
    pub default_pair: u64,
    pub triple_diamond_spins: u32,
    pub pair_diamond_spins: u32,
    /// Symbols a guaranteed-pair token may force.
    pub pairable: Vec<Symbol>,
    pub loss_messages: Vec<String>,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        let triples = [
            (Symbol::Star, 500),
            (Symbol::Watermelon, 250),
            (Symbol::Grapes, 150),
            (Symbol::Orange, 100),
            (Symbol::Lemon, 75),
            (Symbol::Cherry, 50),
        ]
        .into_iter()
        .collect();
        let pairs = [
            (Symbol::Star, 50),
            (Symbol::Watermelon, 25),
            (Symbol::Grapes, 15),
            (Symbol::Orange, 10),
            (Symbol::Lemon, 8),
            (Symbol::Cherry, 5),
        ]
        .into_iter()
        .collect();
        let loss_messages = [
            "No luck this time 😢",
            "The badger stayed in its burrow 🦡💨",
            "Next time for sure!",
            "So close, and yet so far.",
            "The burrow stays shut today.",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            dachs_triple: DACHS_TRIPLE_PAYOUT,
            dachs_pair: DACHS_PAIR_PAYOUT,
            dachs_single: DACHS_SINGLE_PAYOUT,
            triples,
            pairs,
            default_triple: 50,
            default_pair: 5,
            triple_diamond_spins: FREE_SPINS_TRIPLE_DIAMOND,
            pair_diamond_spins: FREE_SPINS_PAIR_DIAMOND,
            pairable: vec![
                Symbol::Cherry,
                Symbol::Lemon,
                Symbol::Orange,
                Symbol::Grapes,
                Symbol::Watermelon,
                Symbol::Star,
            ],
            loss_messages,
        }
    }
}

impl PayoutConfig {
    pub fn triple(&self, symbol: Symbol) -> u64 {
        match symbol {
            Symbol::Dachs => self.dachs_triple,
            _ => self.triples.get(&symbol).copied().unwrap_or(self.default_triple),
        }
    }

    pub fn pair(&self, symbol: Symbol) -> u64 {
        match symbol {
            Symbol::Dachs => self.dachs_pair,
            _ => self.pairs.get(&symbol).copied().unwrap_or(self.default_pair),
        }
    }

    /// Symbol with the highest listed triple payout; ties go to table order.
    pub fn best_triple_symbol(&self) -> Symbol {
        self.triples
            .iter()
            .fold(None, |best: Option<(Symbol, u64)>, (&symbol, &payout)| match best {
                Some((_, top)) if top >= payout => best,
                _ => Some((symbol, payout)),
            })
            .map(|(symbol, _)| symbol)
            .unwrap_or(Symbol::Star)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    pub lucky_charm_multiplier: f64,
    pub locator_multiplier: f64,
    pub rage_step: u32,
    pub rage_max: u32,
    pub star_magnet_reroll: f64,
    pub star_magnet_boost: f64,
    pub diamond_rush_reroll: f64,
    pub diamond_rush_boost: f64,
    pub golden_hour_percent: u64,
    pub symbol_boost_multiplier: u64,
    pub win_multiplier: u64,
    pub insurance_refund_percent: u64,
    pub hot_streak_wins: u32,
    pub hot_streak_bonus: u64,
    pub comeback_losses: u32,
    pub comeback_bonus: u64,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            lucky_charm_multiplier: 2.0,
            locator_multiplier: 3.0,
            rage_step: 5,
            rage_max: 50,
            star_magnet_reroll: 0.75,
            star_magnet_boost: 0.33,
            diamond_rush_reroll: 0.75,
            diamond_rush_boost: 0.33,
            golden_hour_percent: 30,
            symbol_boost_multiplier: 2,
            win_multiplier: 2,
            insurance_refund_percent: 50,
            hot_streak_wins: 3,
            hot_streak_bonus: 500,
            comeback_losses: 5,
            comeback_bonus: 150,
        }
    }
}

/// A spin stake and the unlock it requires, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTier {
    pub amount: u64,
    #[serde(default)]
    pub unlock: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_balance: u64,
    pub max_balance: u64,
    pub base_cost: u64,
    pub stakes: Vec<StakeTier>,
    /// Unlock that permits `spin all`.
    pub all_in_unlock: Option<String>,
    pub cooldown_ms: u64,
    pub daily_bonus: u64,
    /// Hourly jackpot bonus; zero disables the jackpot.
    pub jackpot_bonus: u64,
    pub utc_offset_minutes: i32,
    pub peek_ttl_secs: u64,
    pub flag_ttl_secs: u64,
    pub free_spins_ttl_secs: u64,
    pub weekly_ttl_secs: u64,
    pub streak_ttl_secs: u64,
    pub daily_ttl_secs: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        let stake = |amount: u64, unlock: Option<&str>| StakeTier {
            amount,
            unlock: unlock.map(str::to_string),
        };
        Self {
            starting_balance: STARTING_BALANCE,
            max_balance: MAX_BALANCE,
            base_cost: BASE_SPIN_COST,
            stakes: vec![
                stake(10, None),
                stake(20, Some("slots_20")),
                stake(30, Some("slots_30")),
                stake(50, Some("slots_50")),
                stake(100, Some("slots_100")),
            ],
            all_in_unlock: Some("slots_all".to_string()),
            cooldown_ms: COOLDOWN_MS,
            daily_bonus: DAILY_BONUS,
            jackpot_bonus: HOURLY_JACKPOT_BONUS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            peek_ttl_secs: PEEK_TTL_SECS,
            flag_ttl_secs: FLAG_TTL_SECS,
            free_spins_ttl_secs: FREE_SPINS_TTL_SECS,
            weekly_ttl_secs: WEEKLY_TTL_SECS,
            streak_ttl_secs: STREAK_TTL_SECS,
            daily_ttl_secs: DAILY_TTL_SECS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay_ms: RETRY_BASE_DELAY_MS,
        }
    }
}

/// Demo scaffolding: forces two rare symbols for one account at a fixed rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    pub account: String,
    pub pair_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub symbols: SymbolConfig,
    pub payouts: PayoutConfig,
    pub modifiers: ModifierConfig,
    pub economy: EconomyConfig,
    pub retry: RetryConfig,
    pub shop: Vec<ShopItem>,
    pub mystery_box_pool: Vec<u32>,
    pub wheel: Vec<WheelSlot>,
    pub debug: Option<DebugConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbols: SymbolConfig::default(),
            payouts: PayoutConfig::default(),
            modifiers: ModifierConfig::default(),
            economy: EconomyConfig::default(),
            retry: RetryConfig::default(),
            shop: default_catalog(),
            mystery_box_pool: default_mystery_box_pool(),
            wheel: default_wheel(),
            debug: None,
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability {
            field,
            value: value.to_string(),
        })
    }
}

impl Config {
    pub fn item(&self, id: u32) -> Option<&ShopItem> {
        self.shop.iter().find(|item| item.id == id)
    }

    /// Whether the debug account path applies to `username`.
    pub fn is_debug_account(&self, username: &str) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|debug| debug.account.eq_ignore_ascii_case(username))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Symbols
        let total: u64 = self.symbols.weights.iter().map(|w| w.weight as u64).sum();
        if total == 0 {
            return Err(ConfigError::EmptyWeights);
        }
        if let Some(bad) = self
            .symbols
            .weights
            .iter()
            .find(|w| matches!(w.symbol, Symbol::Dachs | Symbol::Wild))
        {
            return Err(ConfigError::UnweightableSymbol(bad.symbol));
        }
        check_probability("symbols.dachs_chance", self.symbols.dachs_chance)?;

        // Payouts
        if self.payouts.pairable.is_empty() {
            return Err(ConfigError::Empty {
                field: "payouts.pairable",
            });
        }
        if self.payouts.pairable.contains(&Symbol::Wild) {
            return Err(ConfigError::UnweightableSymbol(Symbol::Wild));
        }
        if self.payouts.loss_messages.is_empty() {
            return Err(ConfigError::Empty {
                field: "payouts.loss_messages",
            });
        }

        // Modifiers
        let m = &self.modifiers;
        check_probability("modifiers.star_magnet_reroll", m.star_magnet_reroll)?;
        check_probability("modifiers.star_magnet_boost", m.star_magnet_boost)?;
        check_probability("modifiers.diamond_rush_reroll", m.diamond_rush_reroll)?;
        check_probability("modifiers.diamond_rush_boost", m.diamond_rush_boost)?;
        if m.rage_max > MAX_STACK {
            return Err(ConfigError::RageMaxTooHigh(m.rage_max));
        }

        // Economy
        let e = &self.economy;
        if e.base_cost == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "economy.base_cost",
            });
        }
        if e.starting_balance > e.max_balance {
            return Err(ConfigError::StartingAboveMax {
                starting: e.starting_balance,
                max: e.max_balance,
            });
        }
        if let Some(stake) = e.stakes.iter().find(|s| s.amount < e.base_cost) {
            return Err(ConfigError::StakeBelowBase(stake.amount));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "retry.max_attempts",
            });
        }
        if let Some(debug) = &self.debug {
            check_probability("debug.pair_rate", debug.pair_rate)?;
        }

        self.validate_shop()
    }

    fn validate_shop(&self) -> Result<(), ConfigError> {
        let mut ids = HashSet::new();
        for item in &self.shop {
            if !ids.insert(item.id) {
                return Err(ConfigError::DuplicateItem(item.id));
            }
        }

        let unlocks: HashSet<&str> = self
            .shop
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Unlock { unlock, .. } => Some(unlock.as_str()),
                _ => None,
            })
            .collect();
        let ranks: HashSet<_> = self
            .shop
            .iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Prestige { rank, .. } => Some(*rank),
                _ => None,
            })
            .collect();

        for item in &self.shop {
            match &item.kind {
                ItemKind::Unlock {
                    requires: Some(required),
                    ..
                } if !unlocks.contains(required.as_str()) => {
                    return Err(ConfigError::UnknownPrerequisite {
                        item: item.id,
                        what: "unlock",
                        value: required.clone(),
                    });
                }
                ItemKind::Prestige {
                    requires: Some(required),
                    ..
                } if !ranks.contains(required) => {
                    return Err(ConfigError::UnknownPrerequisite {
                        item: item.id,
                        what: "rank",
                        value: required.as_str().to_string(),
                    });
                }
                ItemKind::Instant(InstantEffect::ChaosSpin { min, max })
                | ItemKind::Instant(InstantEffect::ReverseChaos { min, max })
                    if min > max =>
                {
                    return Err(ConfigError::InvertedRange(item.id));
                }
                ItemKind::Instant(InstantEffect::DiamondMine {
                    min_spins,
                    max_spins,
                }) if min_spins > max_spins => {
                    return Err(ConfigError::InvertedRange(item.id));
                }
                ItemKind::Instant(InstantEffect::Wheel)
                    if self.wheel.iter().all(|slot| slot.weight == 0) =>
                {
                    return Err(ConfigError::Empty { field: "wheel" });
                }
                ItemKind::Instant(InstantEffect::MysteryBox) if self.mystery_box_pool.is_empty() => {
                    return Err(ConfigError::Empty {
                        field: "mystery_box_pool",
                    });
                }
                _ => {}
            }
        }

        for id in &self.mystery_box_pool {
            let grantable = self.item(*id).is_some_and(|item| {
                matches!(
                    item.kind,
                    ItemKind::TimedBuff { .. }
                        | ItemKind::SymbolBoost { .. }
                        | ItemKind::Insurance { .. }
                        | ItemKind::WinMultiplier
                        | ItemKind::Instant(InstantEffect::GuaranteedPair)
                        | ItemKind::Instant(InstantEffect::WildCard)
                )
            });
            if !grantable {
                return Err(ConfigError::InvalidPoolItem(*id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_best_triple_symbol() {
        let payouts = PayoutConfig::default();
        assert_eq!(payouts.best_triple_symbol(), Symbol::Star);
        assert_eq!(payouts.triple(Symbol::Diamond), payouts.default_triple);
        assert_eq!(payouts.pair(Symbol::Dachs), DACHS_PAIR_PAYOUT);
    }

    #[test]
    fn test_rejects_rare_symbol_weight() {
        let mut config = Config::default();
        config.symbols.weights.push(WeightedSymbol {
            symbol: Symbol::Dachs,
            weight: 1,
        });
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnweightableSymbol(Symbol::Dachs))
        );
    }

    #[test]
    fn test_rejects_unknown_unlock_prerequisite() {
        let mut config = Config::default();
        config.shop.push(ShopItem {
            id: 99,
            name: "Broken".into(),
            price: 1,
            kind: ItemKind::Unlock {
                unlock: "slots_1000".into(),
                requires: Some("slots_500".into()),
            },
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownPrerequisite { item: 99, .. })
        ));
    }

    #[test]
    fn test_rejects_ungrantable_pool_item() {
        let mut config = Config::default();
        config.mystery_box_pool.push(3);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPoolItem(3)));
    }

    #[test]
    fn test_rejects_duplicate_item() {
        let mut config = Config::default();
        let first = config.shop[0].clone();
        config.shop.push(first);
        assert_eq!(config.validate(), Err(ConfigError::DuplicateItem(1)));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "economy:\n  starting_balance: 250\n  cooldown_ms: 0\nretry:\n  max_attempts: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.economy.starting_balance, 250);
        assert_eq!(config.economy.cooldown_ms, 0);
        assert_eq!(config.economy.base_cost, BASE_SPIN_COST);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.shop, default_catalog());
        assert_eq!(config.validate(), Ok(()));
    }
}
