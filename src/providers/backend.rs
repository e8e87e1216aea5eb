use super::util::{build_client, rate_url, request_rate};
use crate::core::config::BackendProviderConfig;
use crate::core::{RateError, RateSource, Source};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

const RATE_ENDPOINT: &str = "/exchange-rates/rate";

/// Authoritative rates from the application backend.
///
/// Only queried while a bearer token is configured. A rejected token surfaces
/// as [`RateError::Unauthorized`] so the resolver can fall through to the
/// external provider.
pub struct BackendRateSource {
    base_url: String,
    token: Option<String>,
    retries: usize,
    client: Client,
}

impl BackendRateSource {
    pub fn new(config: &BackendProviderConfig, token: Option<String>) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            token,
            retries: config.retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl RateSource for BackendRateSource {
    fn source(&self) -> Source {
        Source::Backend
    }

    fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn lookup(&self, from: &str, to: &str) -> Result<Option<f64>, RateError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };
        let url = rate_url(&self.base_url, RATE_ENDPOINT, from, to)?;
        request_rate(&self.client, &url, Some(token), self.retries, from, to).await
    }
}
