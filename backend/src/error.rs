//! Error types shared across the backend.
//!
//! Dispatch outcomes have their own taxonomy in `capi::DispatchError`; the
//! types here cover persistence, startup configuration and event assembly.

use common::model::market::Currency;
use thiserror::Error;

/// Failure of the key-value persistence port.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored value is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store lock poisoned")]
    Poisoned,
}

/// Invalid startup configuration. The server refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
    #[error("rate table has no rate for {0}")]
    MissingRate(Currency),
    #[error("rate for {0} must be positive")]
    NonPositiveRate(Currency),
    #[error("market `{0}` is configured more than once")]
    DuplicateMarket(String),
}

/// Reasons the event builder refuses to produce a conversion event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("missing required field `{0}`")]
    MissingRequiredField(&'static str),
    #[error("invalid value for field `{0}`")]
    InvalidField(&'static str),
    #[error("unknown market `{0}`")]
    UnknownMarket(String),
    #[error("unknown courier `{courier}` for market `{market}`")]
    UnknownCourier { market: String, courier: String },
}
