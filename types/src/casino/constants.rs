/// Starting balance credited on a user's first balance read
pub const STARTING_BALANCE: u64 = 100;

/// Hard ceiling for any user balance
pub const MAX_BALANCE: u64 = 1_000_000_000;

/// Cost of a standard spin; stakes scale payouts relative to this
pub const BASE_SPIN_COST: u64 = 10;

/// Minimum time between two spins of the same user
pub const COOLDOWN_MS: u64 = 30_000;

/// Base chance for a cell to become the rare symbol (1 in 150)
pub const DACHS_BASE_CHANCE: f64 = 1.0 / 150.0;

/// Upper bound for any stack-type buff counter
pub const MAX_STACK: u32 = 100;

/// Upper bound accepted when decoding a use-limited buff
pub const MAX_BUFF_USES: u32 = 1_000;

/// Sentinel stored under one-shot flag keys
pub const FLAG_ACTIVE: &str = "active";

// Payouts of the rare-symbol tiers.
pub const DACHS_TRIPLE_PAYOUT: u64 = 15_000;
pub const DACHS_PAIR_PAYOUT: u64 = 2_500;
pub const DACHS_SINGLE_PAYOUT: u64 = 100;

// Diamond free-spin awards.
pub const FREE_SPINS_TRIPLE_DIAMOND: u32 = 5;
pub const FREE_SPINS_PAIR_DIAMOND: u32 = 1;

/// Insurance charges granted per purchase
pub const INSURANCE_PACK_SIZE: u32 = 5;

/// Daily bonus amount
pub const DAILY_BONUS: u64 = 50;

/// Hourly jackpot bonus amount
pub const HOURLY_JACKPOT_BONUS: u64 = 100;

// Storage TTLs (seconds).
pub const PEEK_TTL_SECS: u64 = 3_600;
pub const FLAG_TTL_SECS: u64 = 30 * 24 * 3_600;
pub const FREE_SPINS_TTL_SECS: u64 = 30 * 24 * 3_600;
pub const WEEKLY_TTL_SECS: u64 = 8 * 24 * 3_600;
pub const STREAK_TTL_SECS: u64 = 7 * 24 * 3_600;
pub const DAILY_TTL_SECS: u64 = 2 * 24 * 3_600;
pub const JACKPOT_TTL_SECS: u64 = 3_600;

/// Central European Time, used for day/hour/week boundaries
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 60;

// Retry-verify protocol.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 50;
