//! Execution engine for the dachsbau slot economy.
//!
//! [Casino] turns a [dachsbau_types::api::Request] into a
//! [dachsbau_types::api::Response] against any [Store]. All state lives in the
//! store; multi-step updates go through the optimistic read-modify-write
//! helpers in [optimistic].

pub mod buffs;
pub mod freespins;
pub mod jackpot;
pub mod optimistic;
pub mod rng;
pub mod slots;
pub mod time;
pub mod wallet;
pub mod weekly;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;


mod layer;

mod state;

pub use layer::Casino;
pub use rng::{GameRng, RandomSource, SecureRandom};
pub use state::{Clock, Memory, Store, StoreError, SystemClock};
