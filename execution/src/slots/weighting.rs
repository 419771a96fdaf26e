use crate::rng::RandomSource;
use dachsbau_types::{casino::Symbol, config::WeightedSymbol};

/// Precomputed cumulative distribution over the regular symbols.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    /// `(upper bound, symbol)` with bounds normalized to `(0, 1]`.
    cumulative: Vec<(f64, Symbol)>,
}

impl SymbolTable {
    pub fn new(weights: &[WeightedSymbol]) -> Self {
        let total: u64 = weights.iter().map(|w| w.weight as u64).sum();
        let mut running = 0u64;
        let mut cumulative = Vec::with_capacity(weights.len());
        for entry in weights {
            running += entry.weight as u64;
            let bound = if total == 0 {
                1.0
            } else {
                running as f64 / total as f64
            };
            cumulative.push((bound, entry.symbol));
        }
        if let Some(last) = cumulative.last_mut() {
            // Guard against rounding leaving a gap below 1.0
            last.0 = 1.0;
        }
        Self { cumulative }
    }

    /// Map a uniform draw in `[0, 1)` to a symbol.
    ///
    /// Picks the first bucket whose upper bound is strictly greater than the
    /// draw, so a draw sitting exactly on a boundary belongs to the next
    /// bucket and equal bounds resolve to the lowest index.
    pub fn pick(&self, draw: f64) -> Symbol {
        let index = self.cumulative.partition_point(|(bound, _)| *bound <= draw);
        self.cumulative
            .get(index)
            .or_else(|| self.cumulative.last())
            .map(|(_, symbol)| *symbol)
            .unwrap_or(Symbol::Cherry)
    }

    pub fn draw<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Symbol {
        self.pick(rng.next_f64())
    }
}
