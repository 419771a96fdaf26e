use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{BuffKind, Symbol};

/// Prestige ranks in ascending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Legend,
}

impl Rank {
    pub const ALL: [Rank; 5] = [
        Rank::Bronze,
        Rank::Silver,
        Rank::Gold,
        Rank::Platinum,
        Rank::Legend,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Rank::Bronze => "bronze",
            Rank::Silver => "silver",
            Rank::Gold => "gold",
            Rank::Platinum => "platinum",
            Rank::Legend => "legend",
        }
    }

    pub const fn glyph(self) -> &'static str {
        match self {
            Rank::Bronze => "🥉",
            Rank::Silver => "🥈",
            Rank::Gold => "🥇",
            Rank::Platinum => "💠",
            Rank::Legend => "👑",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.glyph(), self.as_str())
    }
}

impl FromStr for Rank {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rank::ALL
            .into_iter()
            .find(|rank| rank.as_str() == s.trim())
            .ok_or(())
    }
}

/// Instant items resolve their effect right after payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum InstantEffect {
    /// Grants a random item from the mystery-box pool.
    MysteryBox,
    /// Pays a uniformly random amount in `[min, max]`.
    ChaosSpin { min: u64, max: u64 },
    /// Like chaos spin with a narrower, safer range.
    ReverseChaos { min: u64, max: u64 },
    /// Spins the weighted prize wheel.
    Wheel,
    /// Grants a random number of 1× free spins.
    DiamondMine { min_spins: u32, max_spins: u32 },
    /// Forces a pair on the next spin that would not have one.
    GuaranteedPair,
    /// Replaces one cell of the next spin with a wild.
    WildCard,
}

/// Item categories. Each variant carries the fields its purchase handler needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Prestige {
        rank: Rank,
        #[serde(default)]
        requires: Option<Rank>,
    },
    Unlock {
        unlock: String,
        #[serde(default)]
        requires: Option<String>,
    },
    TimedBuff {
        buff: BuffKind,
        duration_secs: u64,
        #[serde(default)]
        uses: Option<u32>,
    },
    SymbolBoost {
        symbol: Symbol,
        #[serde(default)]
        weekly_limit: Option<u32>,
    },
    Insurance {
        count: u32,
    },
    WinMultiplier,
    SpinBundle {
        spins: u32,
        weekly_limit: u32,
    },
    PeekToken,
    Instant(InstantEffect),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: u32,
    pub name: String,
    pub price: u64,
    pub kind: ItemKind,
}

/// One wedge of the prize wheel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSlot {
    pub label: String,
    pub weight: u32,
    pub prize: u64,
}

/// Built-in shop catalog.
pub fn default_catalog() -> Vec<ShopItem> {
    fn item(id: u32, name: &str, price: u64, kind: ItemKind) -> ShopItem {
        ShopItem {
            id,
            name: name.to_string(),
            price,
            kind,
        }
    }
    fn unlock(name: &str, requires: Option<&str>) -> ItemKind {
        ItemKind::Unlock {
            unlock: name.to_string(),
            requires: requires.map(str::to_string),
        }
    }

    vec![
        item(1, "🎯 Guaranteed Pair", 180, ItemKind::Instant(InstantEffect::GuaranteedPair)),
        item(2, "🃏 Wild Card", 250, ItemKind::Instant(InstantEffect::WildCard)),
        item(3, "🎁 Mystery Box", 1_000, ItemKind::Instant(InstantEffect::MysteryBox)),
        item(
            4,
            "🌀 Chaos Spin",
            250,
            ItemKind::Instant(InstantEffect::ChaosSpin { min: 0, max: 600 }),
        ),
        item(
            5,
            "🔄 Reverse Chaos",
            150,
            ItemKind::Instant(InstantEffect::ReverseChaos { min: 50, max: 250 }),
        ),
        item(6, "🎡 Wheel of Fortune", 300, ItemKind::Instant(InstantEffect::Wheel)),
        item(
            7,
            "⛏️ Diamond Mine",
            500,
            ItemKind::Instant(InstantEffect::DiamondMine {
                min_spins: 3,
                max_spins: 5,
            }),
        ),
        item(8, "🔮 Peek Token", 75, ItemKind::PeekToken),
        item(9, "🛡️ Insurance Pack", 250, ItemKind::Insurance { count: 5 }),
        item(10, "✖️ Win Multiplier", 250, ItemKind::WinMultiplier),
        item(
            11,
            "🎰 Spin Bundle",
            300,
            ItemKind::SpinBundle {
                spins: 10,
                weekly_limit: 3,
            },
        ),
        item(
            12,
            "🍒 Cherry Boost",
            25,
            ItemKind::SymbolBoost {
                symbol: Symbol::Cherry,
                weekly_limit: None,
            },
        ),
        item(
            13,
            "🍋 Lemon Boost",
            40,
            ItemKind::SymbolBoost {
                symbol: Symbol::Lemon,
                weekly_limit: None,
            },
        ),
        item(
            14,
            "🍊 Orange Boost",
            50,
            ItemKind::SymbolBoost {
                symbol: Symbol::Orange,
                weekly_limit: None,
            },
        ),
        item(
            15,
            "🍇 Grapes Boost",
            75,
            ItemKind::SymbolBoost {
                symbol: Symbol::Grapes,
                weekly_limit: None,
            },
        ),
        item(
            16,
            "🍉 Watermelon Boost",
            125,
            ItemKind::SymbolBoost {
                symbol: Symbol::Watermelon,
                weekly_limit: None,
            },
        ),
        item(
            17,
            "⭐ Star Boost",
            250,
            ItemKind::SymbolBoost {
                symbol: Symbol::Star,
                weekly_limit: None,
            },
        ),
        item(
            18,
            "🦡 Dachs Boost",
            1_500,
            ItemKind::SymbolBoost {
                symbol: Symbol::Dachs,
                weekly_limit: Some(1),
            },
        ),
        item(
            19,
            "🍀 Lucky Charm",
            2_000,
            ItemKind::TimedBuff {
                buff: BuffKind::LuckyCharm,
                duration_secs: 3_600,
                uses: None,
            },
        ),
        item(
            20,
            "🔍 Dachs Locator",
            1_500,
            ItemKind::TimedBuff {
                buff: BuffKind::DachsLocator,
                duration_secs: 3_600,
                uses: Some(10),
            },
        ),
        item(
            21,
            "🔥 Rage Mode",
            4_000,
            ItemKind::TimedBuff {
                buff: BuffKind::RageMode,
                duration_secs: 1_800,
                uses: None,
            },
        ),
        item(
            22,
            "🧲 Star Magnet",
            1_200,
            ItemKind::TimedBuff {
                buff: BuffKind::StarMagnet,
                duration_secs: 3_600,
                uses: None,
            },
        ),
        item(
            23,
            "💎 Diamond Rush",
            1_500,
            ItemKind::TimedBuff {
                buff: BuffKind::DiamondRush,
                duration_secs: 3_600,
                uses: None,
            },
        ),
        item(
            24,
            "🌅 Golden Hour",
            3_500,
            ItemKind::TimedBuff {
                buff: BuffKind::GoldenHour,
                duration_secs: 3_600,
                uses: None,
            },
        ),
        item(25, "🎰 Unlock !slots 20", 500, unlock("slots_20", None)),
        item(26, "🎰 Unlock !slots 30", 1_000, unlock("slots_30", Some("slots_20"))),
        item(27, "🎰 Unlock !slots 50", 2_500, unlock("slots_50", Some("slots_30"))),
        item(28, "🎰 Unlock !slots 100", 5_000, unlock("slots_100", Some("slots_50"))),
        item(29, "🎰 Unlock !slots all", 10_000, unlock("slots_all", Some("slots_100"))),
        item(
            30,
            "🥉 Bronze Dachs",
            5_000,
            ItemKind::Prestige {
                rank: Rank::Bronze,
                requires: None,
            },
        ),
        item(
            31,
            "🥈 Silver Dachs",
            15_000,
            ItemKind::Prestige {
                rank: Rank::Silver,
                requires: Some(Rank::Bronze),
            },
        ),
        item(
            32,
            "🥇 Golden Dachs",
            50_000,
            ItemKind::Prestige {
                rank: Rank::Gold,
                requires: Some(Rank::Silver),
            },
        ),
        item(
            33,
            "💠 Platinum Dachs",
            150_000,
            ItemKind::Prestige {
                rank: Rank::Platinum,
                requires: Some(Rank::Gold),
            },
        ),
        item(
            34,
            "👑 Legendary Dachs",
            500_000,
            ItemKind::Prestige {
                rank: Rank::Legend,
                requires: Some(Rank::Platinum),
            },
        ),
    ]
}

/// Items a mystery box may roll.
pub fn default_mystery_box_pool() -> Vec<u32> {
    vec![1, 2, 9, 10, 12, 13, 14, 15, 16, 17, 19, 20, 22, 23, 24]
}

pub fn default_wheel() -> Vec<WheelSlot> {
    fn slot(label: &str, weight: u32, prize: u64) -> WheelSlot {
        WheelSlot {
            label: label.to_string(),
            weight,
            prize,
        }
    }

    vec![
        slot("💀 Nothing", 35, 0),
        slot("🪙 Small win", 30, 150),
        slot("💰 Break even", 20, 300),
        slot("💵 Big win", 10, 600),
        slot("🦡 DACHS JACKPOT", 5, 1_500),
    ]
}
