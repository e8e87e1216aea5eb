use super::util::{build_client, rate_url, request_rate};
use crate::core::config::ExternalProviderConfig;
use crate::core::{RateError, RateSource, Source};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

const RATE_ENDPOINT: &str = "/rate";

/// Third-party market rates, reachable without authentication.
pub struct ExternalRateSource {
    base_url: String,
    retries: usize,
    client: Client,
}

impl ExternalRateSource {
    pub fn new(config: &ExternalProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            retries: config.retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl RateSource for ExternalRateSource {
    fn source(&self) -> Source {
        Source::External
    }

    async fn lookup(&self, from: &str, to: &str) -> Result<Option<f64>, RateError> {
        let url = rate_url(&self.base_url, RATE_ENDPOINT, from, to)?;
        request_rate(&self.client, &url, None, self.retries, from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn external_config(base_url: &str) -> ExternalProviderConfig {
        ExternalProviderConfig {
            base_url: base_url.to_string(),
            timeout_secs: 1,
            retries: 0,
        }
    }

    async fn create_mock_server(
        from: &str,
        to: &str,
        status_code: u16,
        mock_response: &str,
    ) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(RATE_ENDPOINT))
            .and(query_param("from", from))
            .and(query_param("to", to))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_response = r#"{"success": true, "data": {"rate": 75.5, "from": "USD", "to": "RUB"}}"#;
        let mock_server = create_mock_server("USD", "RUB", 200, mock_response).await;

        let source = ExternalRateSource::new(&external_config(&mock_server.uri())).unwrap();
        assert!(source.is_available());
        assert_eq!(source.lookup("USD", "RUB").await.unwrap(), Some(75.5));
    }

    #[tokio::test]
    async fn test_no_rate_found() {
        let mock_server =
            create_mock_server("USD", "XYZ", 200, r#"{"success": false}"#).await;

        let source = ExternalRateSource::new(&external_config(&mock_server.uri())).unwrap();
        assert_eq!(source.lookup("USD", "XYZ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_malformed() {
        let mock_response = r#"{"success": true, "data": {"rate": 0.0, "from": "USD", "to": "EUR"}}"#;
        let mock_server = create_mock_server("USD", "EUR", 200, mock_response).await;

        let source = ExternalRateSource::new(&external_config(&mock_server.uri())).unwrap();
        let result = source.lookup("USD", "EUR").await;
        assert!(matches!(result, Err(RateError::Malformed(_))), "{result:?}");
    }

    #[tokio::test]
    async fn test_not_found_status() {
        let mock_server = create_mock_server("USD", "EUR", 404, "Not Found").await;

        let source = ExternalRateSource::new(&external_config(&mock_server.uri())).unwrap();
        let result = source.lookup("USD", "EUR").await;
        assert!(matches!(result, Err(RateError::Http(404))), "{result:?}");
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Bind then release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let source = ExternalRateSource::new(&external_config(&base_url)).unwrap();
        let result = source.lookup("USD", "EUR").await;
        assert!(matches!(result, Err(RateError::Transport(_))), "{result:?}");
    }
}
