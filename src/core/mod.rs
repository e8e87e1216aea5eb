//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use currency::{LocalRateStore, RateError, RateSource, Resolution, Source};
pub use rates::{RateCache, RateEntry, RateKey};
