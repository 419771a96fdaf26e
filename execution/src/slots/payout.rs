//! Pure scoring of a finished grid.
//!
//! Tiers are checked in a fixed order and the first match wins:
//! rare triple, rare pair, rare single, diamond free spins, triple, adjacent
//! pair, loss. Rare symbols and diamonds are counted on the grid as rolled;
//! the triple and pair tiers see the grid after wilds are resolved.

use crate::rng::RandomSource;
use dachsbau_types::{
    casino::{Grid, Symbol},
    config::PayoutConfig,
};

/// Outcome of scoring one grid at the base stake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Win {
    pub points: u64,
    pub message: String,
    pub free_spins: u32,
}

impl Win {
    pub fn is_win(&self) -> bool {
        self.points > 0 || self.free_spins > 0
    }
}

/// Substitute wilds with the best concrete reading of the grid.
///
/// One wild next to two different symbols pairs with the more valuable one;
/// the result is laid out as `[pick, pick, leftover]` so the pair is adjacent.
fn resolve_wilds(grid: &Grid, payouts: &PayoutConfig) -> Grid {
    let concrete: Vec<Symbol> = grid.iter().copied().filter(|s| !s.is_wild()).collect();
    match concrete.as_slice() {
        [] => [payouts.best_triple_symbol(); 3],
        [only] => [*only; 3],
        [a, b] if a == b => [*a; 3],
        [a, b] => {
            // Higher pair payout wins, ties go to declaration order
            let (pick, leftover) = match payouts.pair(*a).cmp(&payouts.pair(*b)) {
                std::cmp::Ordering::Greater => (*a, *b),
                std::cmp::Ordering::Less => (*b, *a),
                std::cmp::Ordering::Equal if a <= b => (*a, *b),
                std::cmp::Ordering::Equal => (*b, *a),
            };
            [pick, pick, leftover]
        }
        _ => *grid,
    }
}

fn count(grid: &Grid, symbol: Symbol) -> usize {
    grid.iter().filter(|s| **s == symbol).count()
}

fn three(symbol: Symbol) -> String {
    format!("{symbol}{symbol}{symbol}")
}

/// Score `grid` against the payout tables.
///
/// `rng` is only used to pick a loss message.
pub fn calculate_win<R: RandomSource + ?Sized>(
    grid: &Grid,
    payouts: &PayoutConfig,
    rng: &mut R,
) -> Win {
    let wilds = count(grid, Symbol::Wild);
    let processed = resolve_wilds(grid, payouts);

    let win = |points: u64, message: String| Win {
        points,
        message: if wilds > 0 {
            format!("{message} (Wild!)")
        } else {
            message
        },
        free_spins: 0,
    };

    match count(grid, Symbol::Dachs) {
        3 => {
            return win(
                payouts.dachs_triple,
                format!("{} DACHS JACKPOT! {}", three(Symbol::Dachs), three(Symbol::Dachs)),
            )
        }
        2 => return win(payouts.dachs_pair, "🦡🦡 Double Dachs!".to_string()),
        1 => return win(payouts.dachs_single, "🦡 A Dachs showed up!".to_string()),
        _ => {}
    }

    let diamonds = count(grid, Symbol::Diamond);
    if diamonds == 3 {
        return Win {
            points: 0,
            message: format!(
                "{} Diamond triple: {} free spins!",
                three(Symbol::Diamond),
                payouts.triple_diamond_spins
            ),
            free_spins: payouts.triple_diamond_spins,
        };
    }
    let diamond_pair = (grid[0] == Symbol::Diamond && grid[1] == Symbol::Diamond)
        || (grid[1] == Symbol::Diamond && grid[2] == Symbol::Diamond);
    if diamonds == 2 && diamond_pair {
        return Win {
            points: 0,
            message: format!(
                "💎💎 Two diamonds: {} free spin!",
                payouts.pair_diamond_spins
            ),
            free_spins: payouts.pair_diamond_spins,
        };
    }

    if processed[0] == processed[1] && processed[1] == processed[2] {
        let symbol = processed[0];
        return win(payouts.triple(symbol), format!("{} Triple!", three(symbol)));
    }
    let pair = if processed[0] == processed[1] {
        Some(processed[0])
    } else if processed[1] == processed[2] {
        Some(processed[1])
    } else {
        None
    };
    if let Some(symbol) = pair {
        return win(payouts.pair(symbol), format!("{symbol}{symbol} Pair!"));
    }

    let message = payouts
        .loss_messages
        .get(rng.index(payouts.loss_messages.len()))
        .cloned()
        .unwrap_or_default();
    win(0, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::GameRng;
    use Symbol::*;

    fn score(grid: Grid) -> Win {
        calculate_win(&grid, &PayoutConfig::default(), &mut GameRng::from_u64(0))
    }

    #[test]
    fn test_rare_tiers() {
        let payouts = PayoutConfig::default();
        assert_eq!(score([Dachs, Dachs, Dachs]).points, payouts.dachs_triple);
        assert_eq!(score([Dachs, Cherry, Dachs]).points, payouts.dachs_pair);
        assert_eq!(score([Lemon, Lemon, Dachs]).points, payouts.dachs_single);
    }

    #[test]
    fn test_rare_pair_beats_wild_triple() {
        let payouts = PayoutConfig::default();
        let win = score([Dachs, Dachs, Wild]);
        assert_eq!(win.points, payouts.dachs_pair);
        assert!(win.message.ends_with("(Wild!)"));
    }

    #[test]
    fn test_diamonds_ignore_wilds() {
        let triple = score([Diamond, Diamond, Diamond]);
        assert_eq!((triple.points, triple.free_spins), (0, 5));

        let pair = score([Wild, Diamond, Diamond]);
        assert_eq!((pair.points, pair.free_spins), (0, 1));
        assert!(!pair.message.contains("Wild!"));

        // Non-adjacent diamonds are not a free-spin pair
        let split = score([Diamond, Cherry, Diamond]);
        assert_eq!(split.free_spins, 0);
    }

    #[test]
    fn test_wild_resolution() {
        let payouts = PayoutConfig::default();
        assert_eq!(score([Wild, Wild, Wild]).points, payouts.triple(Star));
        for symbol in [Star, Watermelon, Grapes, Orange, Lemon, Cherry] {
            assert_eq!(score([Wild, Wild, symbol]).points, payouts.triple(symbol));
            assert_eq!(score([symbol, Wild, symbol]).points, payouts.triple(symbol));
        }
    }

    #[test]
    fn test_single_wild_pairs_with_better_symbol() {
        let payouts = PayoutConfig::default();
        let win = score([Cherry, Wild, Star]);
        assert_eq!(win.points, payouts.pair(Star));
        assert!(win.message.ends_with("(Wild!)"));

        // Outer wild still pairs with the better of two non-adjacent symbols
        assert_eq!(score([Lemon, Watermelon, Wild]).points, payouts.pair(Watermelon));
    }

    #[test]
    fn test_triples_and_pairs() {
        let payouts = PayoutConfig::default();
        assert_eq!(score([Grapes, Grapes, Grapes]).points, 150);
        assert_eq!(score([Star, Star, Lemon]).points, payouts.pair(Star));
        assert_eq!(score([Lemon, Orange, Orange]).points, payouts.pair(Orange));
    }

    #[test]
    fn test_non_adjacent_pair_loses() {
        let payouts = PayoutConfig::default();
        for x in [Star, Watermelon, Grapes, Orange, Lemon, Cherry] {
            for y in [Star, Watermelon, Grapes, Orange, Lemon, Cherry] {
                if x == y {
                    continue;
                }
                let win = score([x, y, x]);
                assert_eq!(win.points, 0);
                assert!(!win.is_win());
                assert!(payouts.loss_messages.contains(&win.message));
            }
        }
    }
}
