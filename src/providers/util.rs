use crate::core::currency::{RateError, validate_rate};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const RETRY_DELAY_MS: u64 = 300;
const USER_AGENT: &str = concat!("fxrate/", env!("CARGO_PKG_VERSION"));

/// Retries an async request on transport errors
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// Timeouts are not retried: a slow source should hand over to the next one.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries || err.is_timeout() {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

pub(crate) fn build_client(timeout_secs: u64) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

pub(crate) fn rate_url(base_url: &str, endpoint: &str, from: &str, to: &str) -> Result<Url, RateError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
    Url::parse_with_params(&url, &[("from", from), ("to", to)])
        .map_err(|e| RateError::InvalidUrl(format!("{url}: {e}")))
}

#[derive(Debug, Deserialize)]
struct RateEnvelope {
    success: bool,
    data: Option<RateData>,
}

#[derive(Debug, Deserialize)]
struct RateData {
    rate: f64,
    from: Option<String>,
    to: Option<String>,
}

/// Parses a `{ success, data: { rate, from, to } }` payload.
///
/// `success: false` is a miss; anything that is not a usable positive rate
/// for the requested pair is malformed.
pub(crate) fn parse_rate_response(body: &str, from: &str, to: &str) -> Result<Option<f64>, RateError> {
    let envelope: RateEnvelope = serde_json::from_str(body).map_err(|e| {
        RateError::Malformed(format!("{e} for {from}->{to}. Response: '{body}'"))
    })?;

    if !envelope.success {
        return Ok(None);
    }

    let data = envelope
        .data
        .ok_or_else(|| RateError::Malformed(format!("missing data for {from}->{to}")))?;

    let pair_matches = data.from.as_deref().is_none_or(|f| f.eq_ignore_ascii_case(from))
        && data.to.as_deref().is_none_or(|t| t.eq_ignore_ascii_case(to));
    if !pair_matches {
        return Err(RateError::Malformed(format!(
            "expected {from}->{to}, got {}->{}",
            data.from.unwrap_or_default(),
            data.to.unwrap_or_default()
        )));
    }

    validate_rate(data.rate).map(Some)
}

/// Sends a rate request and maps the HTTP outcome onto a lookup result.
pub(crate) async fn request_rate(
    client: &Client,
    url: &Url,
    token: Option<&str>,
    retries: usize,
    from: &str,
    to: &str,
) -> Result<Option<f64>, RateError> {
    debug!("Requesting rate from {}", url);
    let response = with_retry(
        || {
            let mut request = client.get(url.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request.send()
        },
        retries,
        RETRY_DELAY_MS,
    )
    .await?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RateError::Unauthorized);
    }
    if !status.is_success() {
        return Err(RateError::Http(status.as_u16()));
    }

    let body = response.text().await?;
    parse_rate_response(&body, from, to)
}
