use std::fmt;

use crate::casino::{BuffKind, Symbol};

/// Storage keys.
///
/// Per-user keys are namespaced `{domain}:{username}[:{sub-key}]`; usernames
/// are expected to be lower-cased already (see [crate::api::Request::new]).
/// Singletons use a single global key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Balance(String),
    Cooldown(String),
    Buff(String, BuffKind),
    SymbolBoost(String, Symbol),
    Insurance(String),
    WinMultiplier(String),
    FreeSpins(String),
    Peek(String),
    GuaranteedPair(String),
    WildCard(String),
    /// Weekly purchase counter, keyed by shop item id.
    Weekly(String, u32),
    Unlock(String, String),
    Rank(String),
    Streak(String),
    Daily(String),

    // Global singletons
    Bank,
    Jackpot { day: u32, month: u32, hour: u32 },
}

impl Key {
    /// Owning user of a per-user key.
    pub fn user(&self) -> Option<&str> {
        match self {
            Key::Balance(u)
            | Key::Cooldown(u)
            | Key::Buff(u, _)
            | Key::SymbolBoost(u, _)
            | Key::Insurance(u)
            | Key::WinMultiplier(u)
            | Key::FreeSpins(u)
            | Key::Peek(u)
            | Key::GuaranteedPair(u)
            | Key::WildCard(u)
            | Key::Weekly(u, _)
            | Key::Unlock(u, _)
            | Key::Rank(u)
            | Key::Streak(u)
            | Key::Daily(u) => Some(u),
            Key::Bank | Key::Jackpot { .. } => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Balance(u) => write!(f, "user:{u}"),
            Key::Cooldown(u) => write!(f, "cooldown:{u}"),
            Key::Buff(u, kind) => write!(f, "buff:{u}:{kind}"),
            Key::SymbolBoost(u, symbol) => write!(f, "boost:{u}:{}", symbol.name()),
            Key::Insurance(u) => write!(f, "insurance:{u}"),
            Key::WinMultiplier(u) => write!(f, "winmulti:{u}"),
            Key::FreeSpins(u) => write!(f, "freespins:{u}"),
            Key::Peek(u) => write!(f, "peek:{u}"),
            Key::GuaranteedPair(u) => write!(f, "guaranteedpair:{u}"),
            Key::WildCard(u) => write!(f, "wildcard:{u}"),
            Key::Weekly(u, item) => write!(f, "weekly:{u}:{item}"),
            Key::Unlock(u, name) => write!(f, "unlock:{u}:{name}"),
            Key::Rank(u) => write!(f, "rank:{u}"),
            Key::Streak(u) => write!(f, "streak:{u}"),
            Key::Daily(u) => write!(f, "daily:{u}"),
            Key::Bank => f.write_str("bank:balance"),
            Key::Jackpot { day, month, hour } => write!(f, "jackpot:{day}-{month}-{hour}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_namespaces() {
        assert_eq!(Key::Balance("alice".into()).to_string(), "user:alice");
        assert_eq!(
            Key::Buff("alice".into(), BuffKind::RageMode).to_string(),
            "buff:alice:rage_mode"
        );
        assert_eq!(
            Key::SymbolBoost("alice".into(), Symbol::Star).to_string(),
            "boost:alice:star"
        );
        assert_eq!(Key::Weekly("bob".into(), 11).to_string(), "weekly:bob:11");
        assert_eq!(Key::Bank.to_string(), "bank:balance");
        assert_eq!(
            Key::Jackpot {
                day: 3,
                month: 11,
                hour: 20
            }
            .to_string(),
            "jackpot:3-11-20"
        );
    }

    #[test]
    fn test_key_user() {
        assert_eq!(Key::Peek("carol".into()).user(), Some("carol"));
        assert_eq!(Key::Bank.user(), None);
    }
}
