//! Shared data model for the dachsbau slot economy.
//!
//! Nothing in this crate performs I/O: it defines the symbol alphabet, the
//! storage key namespace, the typed records persisted under those keys, the
//! shop catalog, the immutable [Config] tables, and the request/response
//! shapes exchanged with the chat layer.

pub mod api;
pub mod casino;
pub mod config;
pub mod execution;

pub use config::{Config, ConfigError};
