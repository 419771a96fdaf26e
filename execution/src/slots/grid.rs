use super::weighting::SymbolTable;
use crate::{
    optimistic::consume_flag,
    rng::RandomSource,
    state::Store,
};
use dachsbau_types::{
    api::Consumable,
    casino::{decode_grid, has_adjacent_pair, Grid, Symbol},
    config::{Config, ModifierConfig},
    execution::Key,
};
use tracing::{debug, warn};

/// Buff state that influences how cells are rolled.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Modifiers {
    pub lucky_charm: bool,
    pub locator: bool,
    pub rage_stack: u32,
    pub star_magnet: bool,
    pub diamond_rush: bool,
}

impl Modifiers {
    /// Per-cell rare-symbol chance. Boosts compose multiplicatively.
    pub fn dachs_chance(&self, base: f64, config: &ModifierConfig) -> f64 {
        let mut chance = base;
        if self.lucky_charm {
            chance *= config.lucky_charm_multiplier;
        }
        if self.locator {
            chance *= config.locator_multiplier;
        }
        if self.rage_stack > 0 {
            chance *= 1.0 + self.rage_stack as f64 / 100.0;
        }
        chance.clamp(0.0, 1.0)
    }
}

/// A grid ready for scoring, plus what it used up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinGrid {
    pub grid: Grid,
    pub from_peek: bool,
    pub consumed: Vec<Consumable>,
}

pub struct GridEngine<'a> {
    config: &'a Config,
    table: SymbolTable,
}

impl<'a> GridEngine<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            table: SymbolTable::new(&config.symbols.weights),
        }
    }

    /// Forced-pair rate when `username` is the configured debug account.
    pub fn debug_rate(&self, username: &str) -> Option<f64> {
        self.config
            .debug
            .as_ref()
            .filter(|_| self.config.is_debug_account(username))
            .map(|debug| debug.pair_rate)
    }

    /// Roll three independent cells.
    pub fn roll<R: RandomSource + ?Sized>(
        &self,
        modifiers: &Modifiers,
        debug_rate: Option<f64>,
        rng: &mut R,
    ) -> Grid {
        if let Some(rate) = debug_rate {
            if rng.next_f64() < rate {
                return self.forced_dachs_pair(rng);
            }
        }
        let chance = modifiers.dachs_chance(self.config.symbols.dachs_chance, &self.config.modifiers);
        [
            self.roll_cell(modifiers, chance, rng),
            self.roll_cell(modifiers, chance, rng),
            self.roll_cell(modifiers, chance, rng),
        ]
    }

    fn roll_cell<R: RandomSource + ?Sized>(
        &self,
        modifiers: &Modifiers,
        dachs_chance: f64,
        rng: &mut R,
    ) -> Symbol {
        if rng.next_f64() < dachs_chance {
            return Symbol::Dachs;
        }
        let symbol = self.table.draw(rng);
        let m = &self.config.modifiers;

        // Star pull wins over diamond pull on the same cell
        if modifiers.star_magnet
            && symbol != Symbol::Star
            && rng.next_f64() < m.star_magnet_reroll
            && rng.next_f64() < m.star_magnet_boost
        {
            return Symbol::Star;
        }
        let star_held = modifiers.star_magnet && symbol == Symbol::Star;
        if modifiers.diamond_rush
            && symbol != Symbol::Diamond
            && !star_held
            && rng.next_f64() < m.diamond_rush_reroll
            && rng.next_f64() < m.diamond_rush_boost
        {
            return Symbol::Diamond;
        }
        symbol
    }

    fn forced_dachs_pair<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Grid {
        let odd = rng.index(3);
        let filler = self.table.draw(rng);
        let mut grid = [Symbol::Dachs; 3];
        grid[odd] = filler;
        grid
    }

    /// Overwrite an adjacent window with a random pairable symbol.
    pub fn force_pair<R: RandomSource + ?Sized>(&self, grid: &mut Grid, rng: &mut R) -> Symbol {
        let pairable = &self.config.payouts.pairable;
        let symbol = pairable
            .get(rng.index(pairable.len()))
            .copied()
            .unwrap_or(Symbol::Cherry);
        let start = rng.index(2);
        grid[start] = symbol;
        grid[start + 1] = symbol;
        symbol
    }

    /// Overwrite one random cell with a wild.
    pub fn place_wild<R: RandomSource + ?Sized>(&self, grid: &mut Grid, rng: &mut R) -> usize {
        let cell = rng.index(grid.len());
        grid[cell] = Symbol::Wild;
        cell
    }

    /// Roll a fresh grid and run the special-item pass on it.
    ///
    /// This is shared by real spins and by peek purchases so both see the
    /// same outcome distribution.
    pub async fn produce<S: Store + ?Sized, R: RandomSource + ?Sized>(
        &self,
        store: &S,
        username: &str,
        modifiers: &Modifiers,
        rng: &mut R,
    ) -> SpinGrid {
        let mut grid = self.roll(modifiers, self.debug_rate(username), rng);
        let consumed = self.apply_specials(store, username, &mut grid, rng).await;
        SpinGrid {
            grid,
            from_peek: false,
            consumed,
        }
    }

    /// Grid for the next spin: a stored peek grid if one exists, otherwise
    /// a freshly produced one.
    pub async fn next<S: Store + ?Sized, R: RandomSource + ?Sized>(
        &self,
        store: &S,
        username: &str,
        modifiers: &Modifiers,
        rng: &mut R,
    ) -> SpinGrid {
        if let Some(grid) = take_peek(store, username).await {
            return SpinGrid {
                grid,
                from_peek: true,
                consumed: vec![Consumable::Peek],
            };
        }
        self.produce(store, username, modifiers, rng).await
    }

    async fn apply_specials<S: Store + ?Sized, R: RandomSource + ?Sized>(
        &self,
        store: &S,
        username: &str,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Vec<Consumable> {
        let pair_key = Key::GuaranteedPair(username.to_string());
        let wild_key = Key::WildCard(username.to_string());
        let (pair_flag, wild_flag) = futures::join!(store.get(&pair_key), store.get(&wild_key));
        let held = |flag: Result<Option<String>, _>, key: &Key| match flag {
            Ok(value) => value.is_some(),
            Err(e) => {
                warn!(%key, error = %e, "failed to read special item");
                false
            }
        };

        let mut consumed = Vec::new();
        // A natural pair keeps the token for a later spin
        if held(pair_flag, &pair_key)
            && !has_adjacent_pair(grid)
            && consume_flag(store, &pair_key).await
        {
            let symbol = self.force_pair(grid, rng);
            debug!(username, %symbol, "forced guaranteed pair");
            consumed.push(Consumable::GuaranteedPair);
        }
        if held(wild_flag, &wild_key) && consume_flag(store, &wild_key).await {
            let cell = self.place_wild(grid, rng);
            debug!(username, cell, "placed wild card");
            consumed.push(Consumable::WildCard);
        }
        consumed
    }
}

/// Remove and return a stored peek grid. The key is deleted even when its
/// contents turn out to be unusable.
pub async fn take_peek<S: Store + ?Sized>(store: &S, username: &str) -> Option<Grid> {
    let key = Key::Peek(username.to_string());
    let raw = match store.get(&key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(%key, error = %e, "failed to read peek grid");
            return None;
        }
    };
    if let Err(e) = store.delete(&key).await {
        warn!(%key, error = %e, "failed to delete peek grid");
    }
    match decode_grid(&raw) {
        Ok(grid) => Some(grid),
        Err(e) => {
            warn!(%key, error = %e, "discarding malformed peek grid");
            None
        }
    }
}
