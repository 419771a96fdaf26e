//! Slot machine core.
//!
//! - [weighting]: categorical draw over the regular symbols
//! - [grid]: three-cell grid generation with buff modifiers and special items
//! - [payout]: pure scoring of a finished grid

pub mod grid;
pub mod payout;
pub mod weighting;

pub use grid::{GridEngine, Modifiers, SpinGrid};
pub use payout::{calculate_win, Win};
pub use weighting::SymbolTable;
