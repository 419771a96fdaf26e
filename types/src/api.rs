use serde::Serialize;

use crate::casino::{BuffKind, Grid, Rank, Symbol};

/// Maximum number of arguments accepted per request
pub const MAX_REQUEST_ARGS: usize = 8;

/// A pre-validated chat command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub username: String,
    pub action: String,
    pub args: Vec<String>,
}

impl Request {
    /// Normalizes the username and action to lower case.
    pub fn new(username: &str, action: &str, args: Vec<String>) -> Self {
        Self {
            username: username.trim().to_lowercase(),
            action: action.trim().to_lowercase(),
            args: args.into_iter().take(MAX_REQUEST_ARGS).collect(),
        }
    }

    /// Parse a `username action args...` line. Returns `None` when either the
    /// username or the action is missing.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let username = parts.next()?;
        let action = parts.next()?;
        Some(Self::new(
            username,
            action,
            parts.map(str::to_string).collect(),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The request was carried out.
    Ok,
    /// A validation rule refused the request; nothing was changed.
    Rejected,
    /// An unexpected failure; state may be partially updated.
    Failed,
}

/// Items that are used up by a spin or purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumable {
    Peek,
    GuaranteedPair,
    WildCard,
    SymbolBoost(Symbol),
    WinMultiplier,
    Insurance,
    LocatorUse,
    FreeSpin { multiplier: u32 },
}

/// Side effects reported alongside the user message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    BalanceChanged { before: u64, after: u64 },
    BankChanged { delta: i64 },
    CooldownSet { until: u64 },
    Spun { grid: Grid, points: u64 },
    Consumed { item: Consumable },
    FreeSpinsGranted { multiplier: u32, count: u32 },
    BuffActivated { buff: BuffKind, expire_at: u64 },
    FlagGranted { item_id: u32 },
    InsuranceGranted { count: u32 },
    Unlocked { unlock: String },
    RankAdvanced { rank: Rank },
    PeekStored { wins: bool },
    StreakBonus { amount: u64 },
    JackpotClaimed { amount: u64 },
    DailyClaimed { amount: u64 },
    Refunded { amount: u64 },
}

/// Result of handling a [Request].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
    pub events: Vec<Event>,
}

impl Response {
    pub fn ok(message: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
            events,
        }
    }

    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            status: Status::Rejected,
            message: rejection.to_string(),
            events: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            message: message.into(),
            events: Vec::new(),
        }
    }
}

impl From<Rejection> for Response {
    fn from(rejection: Rejection) -> Self {
        Response::rejected(rejection)
    }
}

/// Validation failures. The `Display` output is shown to the user verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Not enough DachsTaler: you have {balance}, you need {required}.")]
    InsufficientBalance { balance: u64, required: u64 },
    #[error("Unknown item: {0}. Use !shop to see all items.")]
    UnknownItem(String),
    #[error("You need to unlock {0} first.")]
    MissingUnlock(String),
    #[error("You already unlocked {0}.")]
    AlreadyUnlocked(String),
    #[error("You need the {0} rank first.")]
    MissingRank(Rank),
    #[error("You already hold {current}, which is not below {target}.")]
    RankNotHigher { current: Rank, target: Rank },
    #[error("Weekly limit reached: {limit} per week.")]
    WeeklyLimit { limit: u32 },
    #[error("You still hold an unused {0} boost.")]
    BoostAlreadyHeld(Symbol),
    #[error("You already hold this item, use it first.")]
    AlreadyActive,
    #[error("Please wait {remaining_secs}s before spinning again.")]
    Cooldown { remaining_secs: u64 },
    #[error("Invalid stake: {0}. Use 10, 20, 30, 50, 100 or all.")]
    InvalidStake(String),
    #[error("Stake {stake} is locked. Unlock {unlock} in the shop first.")]
    StakeLocked { stake: String, unlock: String },
    #[error("You already claimed your daily bonus today.")]
    DailyAlreadyClaimed,
    #[error("Unknown command: {0}. Try spin, balance, daily, shop, buy, buffs or bank.")]
    UnknownAction(String),
}
