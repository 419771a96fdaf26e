use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Grid, Symbol, MAX_BUFF_USES, MAX_STACK};

/// Errors raised when a stored value does not decode into its typed record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("invalid record: {0}")]
    Invalid(&'static str),
}

impl From<serde_json::Error> for RecordError {
    fn from(e: serde_json::Error) -> Self {
        RecordError::Malformed(e.to_string())
    }
}

/// Timed buffs a user can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuffKind {
    /// Doubles the rare-symbol chance.
    LuckyCharm,
    /// Triples the rare-symbol chance for a limited number of spins.
    DachsLocator,
    /// Builds a stack on every loss; each point adds 1% rare-symbol chance.
    RageMode,
    /// Rerolls cells toward ⭐.
    StarMagnet,
    /// Rerolls cells toward 💎.
    DiamondRush,
    /// Adds a percentage bonus to every win.
    GoldenHour,
}

/// Storage shape of a buff variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuffShape {
    Simple,
    Uses,
    Stack,
}

impl BuffKind {
    pub const ALL: [BuffKind; 6] = [
        BuffKind::LuckyCharm,
        BuffKind::DachsLocator,
        BuffKind::RageMode,
        BuffKind::StarMagnet,
        BuffKind::DiamondRush,
        BuffKind::GoldenHour,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            BuffKind::LuckyCharm => "lucky_charm",
            BuffKind::DachsLocator => "dachs_locator",
            BuffKind::RageMode => "rage_mode",
            BuffKind::StarMagnet => "star_magnet",
            BuffKind::DiamondRush => "diamond_rush",
            BuffKind::GoldenHour => "golden_hour",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            BuffKind::LuckyCharm => "🍀 Lucky Charm",
            BuffKind::DachsLocator => "🔍 Dachs Locator",
            BuffKind::RageMode => "🔥 Rage Mode",
            BuffKind::StarMagnet => "🧲 Star Magnet",
            BuffKind::DiamondRush => "💎 Diamond Rush",
            BuffKind::GoldenHour => "🌅 Golden Hour",
        }
    }

    pub const fn shape(self) -> BuffShape {
        match self {
            BuffKind::DachsLocator => BuffShape::Uses,
            BuffKind::RageMode => BuffShape::Stack,
            _ => BuffShape::Simple,
        }
    }
}

impl fmt::Display for BuffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsesPayload {
    expire_at: u64,
    uses: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackPayload {
    expire_at: u64,
    stack: u32,
}

/// Decoded buff payload.
///
/// Simple buffs are persisted as a bare `expireAt` integer, the other two
/// variants as small JSON objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuffRecord {
    Simple { expire_at: u64 },
    Uses { expire_at: u64, uses: u32 },
    Stack { expire_at: u64, stack: u32 },
}

impl BuffRecord {
    pub fn expire_at(&self) -> u64 {
        match *self {
            BuffRecord::Simple { expire_at }
            | BuffRecord::Uses { expire_at, .. }
            | BuffRecord::Stack { expire_at, .. } => expire_at,
        }
    }

    pub fn shape(&self) -> BuffShape {
        match self {
            BuffRecord::Simple { .. } => BuffShape::Simple,
            BuffRecord::Uses { .. } => BuffShape::Uses,
            BuffRecord::Stack { .. } => BuffShape::Stack,
        }
    }

    /// Active iff not expired and, for use-limited buffs, uses remain.
    pub fn is_active(&self, now_ms: u64) -> bool {
        match *self {
            BuffRecord::Simple { expire_at } | BuffRecord::Stack { expire_at, .. } => {
                now_ms < expire_at
            }
            BuffRecord::Uses { expire_at, uses } => now_ms < expire_at && uses > 0,
        }
    }

    pub fn encode(&self) -> String {
        match *self {
            BuffRecord::Simple { expire_at } => expire_at.to_string(),
            // Serializing two integers cannot fail.
            BuffRecord::Uses { expire_at, uses } => {
                serde_json::to_string(&UsesPayload { expire_at, uses }).unwrap_or_default()
            }
            BuffRecord::Stack { expire_at, stack } => {
                serde_json::to_string(&StackPayload { expire_at, stack }).unwrap_or_default()
            }
        }
    }

    pub fn decode(shape: BuffShape, raw: &str) -> Result<Self, RecordError> {
        let record = match shape {
            BuffShape::Simple => {
                let expire_at = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| RecordError::Malformed(e.to_string()))?;
                BuffRecord::Simple { expire_at }
            }
            BuffShape::Uses => {
                let payload: UsesPayload = serde_json::from_str(raw)?;
                if payload.uses > MAX_BUFF_USES {
                    return Err(RecordError::Invalid("uses out of range"));
                }
                BuffRecord::Uses {
                    expire_at: payload.expire_at,
                    uses: payload.uses,
                }
            }
            BuffShape::Stack => {
                let payload: StackPayload = serde_json::from_str(raw)?;
                if payload.stack > MAX_STACK {
                    return Err(RecordError::Invalid("stack out of range"));
                }
                BuffRecord::Stack {
                    expire_at: payload.expire_at,
                    stack: payload.stack,
                }
            }
        };
        if record.expire_at() == 0 {
            return Err(RecordError::Invalid("missing expiry"));
        }
        Ok(record)
    }
}

/// A group of free spins sharing the same payout multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpinBucket {
    pub multiplier: u32,
    pub count: u32,
}

/// Free spins owned by a user, kept sorted ascending by multiplier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FreeSpinLedger {
    pub buckets: Vec<FreeSpinBucket>,
}

impl FreeSpinLedger {
    pub fn total(&self) -> u32 {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Merge into the bucket of the same multiplier or append a new one.
    pub fn add(&mut self, multiplier: u32, count: u32) {
        if count == 0 || multiplier == 0 {
            return;
        }
        match self.buckets.iter_mut().find(|b| b.multiplier == multiplier) {
            Some(bucket) => bucket.count = bucket.count.saturating_add(count),
            None => self.buckets.push(FreeSpinBucket { multiplier, count }),
        }
        self.buckets.sort_by_key(|b| b.multiplier);
    }

    /// Take one spin from the lowest-multiplier bucket.
    pub fn consume(&mut self) -> Option<u32> {
        self.buckets.retain(|b| b.count > 0);
        let bucket = self.buckets.first_mut()?;
        let multiplier = bucket.multiplier;
        bucket.count -= 1;
        if bucket.count == 0 {
            self.buckets.remove(0);
        }
        Some(multiplier)
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn decode(raw: &str) -> Result<Self, RecordError> {
        let ledger: FreeSpinLedger = serde_json::from_str(raw)?;
        if ledger.buckets.iter().any(|b| b.count == 0 || b.multiplier == 0) {
            return Err(RecordError::Invalid("empty free-spin bucket"));
        }
        if ledger
            .buckets
            .windows(2)
            .any(|w| w[0].multiplier >= w[1].multiplier)
        {
            return Err(RecordError::Invalid("free-spin buckets out of order"));
        }
        Ok(ledger)
    }
}

/// Purchase counter that resets whenever the computed week start moves on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCounter {
    pub count: u32,
    pub week_start: u64,
}

impl WeeklyCounter {
    /// Count that applies to the given week; stale weeks read as zero.
    pub fn count_for(&self, week_start: u64) -> u32 {
        if self.week_start == week_start {
            self.count
        } else {
            0
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Consecutive win/loss tracker used for streak bonuses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub wins: u32,
    pub losses: u32,
}

impl Streak {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Stored peek grid: a JSON array of three glyphs.
pub fn encode_grid(grid: &Grid) -> String {
    serde_json::to_string(grid).unwrap_or_default()
}

pub fn decode_grid(raw: &str) -> Result<Grid, RecordError> {
    let cells: Vec<Symbol> = serde_json::from_str(raw)?;
    cells
        .try_into()
        .map_err(|_| RecordError::Invalid("grid must have three cells"))
}
