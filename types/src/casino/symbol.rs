use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Slot symbols in payout order (most valuable first).
///
/// The declaration order doubles as the tie-break order whenever two symbols
/// carry the same payout, so it must not be reshuffled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "🦡")]
    Dachs,
    #[serde(rename = "💎")]
    Diamond,
    #[serde(rename = "⭐")]
    Star,
    #[serde(rename = "🍉")]
    Watermelon,
    #[serde(rename = "🍇")]
    Grapes,
    #[serde(rename = "🍊")]
    Orange,
    #[serde(rename = "🍋")]
    Lemon,
    #[serde(rename = "🍒")]
    Cherry,
    #[serde(rename = "🃏")]
    Wild,
}

/// A single spin outcome, left to right.
pub type Grid = [Symbol; 3];

impl Symbol {
    pub const ALL: [Symbol; 9] = [
        Symbol::Dachs,
        Symbol::Diamond,
        Symbol::Star,
        Symbol::Watermelon,
        Symbol::Grapes,
        Symbol::Orange,
        Symbol::Lemon,
        Symbol::Cherry,
        Symbol::Wild,
    ];

    pub const fn glyph(self) -> &'static str {
        match self {
            Symbol::Dachs => "🦡",
            Symbol::Diamond => "💎",
            Symbol::Star => "⭐",
            Symbol::Watermelon => "🍉",
            Symbol::Grapes => "🍇",
            Symbol::Orange => "🍊",
            Symbol::Lemon => "🍋",
            Symbol::Cherry => "🍒",
            Symbol::Wild => "🃏",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Symbol::Dachs => "dachs",
            Symbol::Diamond => "diamond",
            Symbol::Star => "star",
            Symbol::Watermelon => "watermelon",
            Symbol::Grapes => "grapes",
            Symbol::Orange => "orange",
            Symbol::Lemon => "lemon",
            Symbol::Cherry => "cherry",
            Symbol::Wild => "wild",
        }
    }

    pub fn is_wild(self) -> bool {
        self == Symbol::Wild
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown symbol: {0}")]
pub struct UnknownSymbol(pub String);

impl FromStr for Symbol {
    type Err = UnknownSymbol;

    /// Accepts either the glyph or the lower-case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.glyph() == trimmed || symbol.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownSymbol(trimmed.to_string()))
    }
}

/// Render a grid the way it is shown in chat: `[ 🍒 | 🍋 | ⭐ ]`.
pub fn render_grid(grid: &Grid) -> String {
    format!("[ {} | {} | {} ]", grid[0], grid[1], grid[2])
}

/// True when two adjacent cells (0-1 or 1-2) match, which is what the
/// payout tiers consider a pair.
pub fn has_adjacent_pair(grid: &Grid) -> bool {
    grid[0] == grid[1] || grid[1] == grid[2]
}
