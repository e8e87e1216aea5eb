//! Currency conversion abstractions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

/// Reference currency used to synthesize cross rates.
pub const PIVOT_CURRENCY: &str = "USD";

/// Trims and upper-cases a user supplied currency code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Errors raised by a single rate lookup step.
///
/// These never escape the resolver: it logs them and moves on to the next
/// step of the fallback chain.
#[derive(Error, Debug)]
pub enum RateError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication rejected")]
    Unauthorized,

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RateError {
    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RateError::Transport(_) => "transport",
            RateError::Unauthorized => "unauthorized",
            RateError::Http(_) => "http",
            RateError::Malformed(_) => "malformed",
            RateError::Store(_) => "store",
            RateError::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Rejects rates that cannot be used for conversion.
pub fn validate_rate(rate: f64) -> Result<f64, RateError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(RateError::Malformed(format!("non-positive rate {rate}")))
    }
}

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Identity,
    Cache,
    LocalStore,
    Backend,
    External,
    Cross,
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Source::Identity => "identity",
                Source::Cache => "cache",
                Source::LocalStore => "local store",
                Source::Backend => "backend",
                Source::External => "external",
                Source::Cross => "cross",
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub rate: f64,
    pub source: Source,
}

/// A single step of the rate fallback chain.
///
/// `Ok(Some(rate))` is a hit, `Ok(None)` a miss and `Err(_)` a failure the
/// resolver treats as a miss.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn source(&self) -> Source;

    /// Sources that cannot be queried right now (no token, store not opened)
    /// are skipped without being called.
    fn is_available(&self) -> bool {
        true
    }

    async fn lookup(&self, from: &str, to: &str) -> Result<Option<f64>, RateError>;
}

/// Device-local persisted rates, treated by the resolver as a second tier cache.
#[async_trait]
pub trait LocalRateStore: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn get_rate(&self, from: &str, to: &str) -> Result<Option<f64>, RateError>;

    async fn save_rate(&self, from: &str, to: &str, rate: f64) -> Result<(), RateError>;
}
