//! Outbound HTTP adapter shared by every provider connector.
//!
//! Wraps a single `reqwest::Client` and turns each call into either a
//! decoded payload or a [`ProviderError`]. Query parameters are passed
//! separately from the endpoint so error messages and logs carry the bare
//! URL and never an API key.
//!
//! Retry strategy:
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry
//!
//! With `max_retries = 0` the first failure is returned as-is.

use anyhow::Result;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::ProviderError;

/// Key-value pairs appended to the query string.
pub type Params<'a> = [(&'a str, String)];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HttpConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2·base, 4·base, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::from_config(config),
        })
    }

    /// `GET url?params` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &Params<'_>,
    ) -> Result<T, ProviderError> {
        let body = self
            .send_with_retry(url, || self.client.get(url).query(params))
            .await?;
        decode(url, &body)
    }

    /// `POST url` with a plain-text body (IGDB's query language) and decode
    /// the JSON response.
    pub async fn post_text_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &Params<'_>,
        body: &str,
    ) -> Result<T, ProviderError> {
        let text = self
            .send_with_retry(url, || {
                let mut req = self
                    .client
                    .post(url)
                    .header("Accept", "application/json")
                    .body(body.to_string());
                for (name, value) in headers {
                    req = req.header(*name, value);
                }
                req
            })
            .await?;
        decode(url, &text)
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<String, ProviderError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            debug!(url, attempt, "sending provider request");
            let err = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|source| ProviderError::Transport {
                                url: url.to_string(),
                                source,
                            });
                    }
                    let body = response.text().await.unwrap_or_default();
                    ProviderError::Status {
                        status,
                        url: url.to_string(),
                        body,
                    }
                }
                Err(source) => ProviderError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if !err.is_transient() || attempt >= self.retry.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = self.retry.delay(attempt);
            warn!(url, attempt, ?delay, error = %err, "retrying provider request");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Serde helper for provider fields that may be absent *or* `null`.
///
/// Use as `#[serde(default, deserialize_with = "crate::http::nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|source| ProviderError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(6), Duration::from_millis(3200));
        assert_eq!(policy.delay(9), Duration::from_millis(3200));
    }

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(default, deserialize_with = "nullable")]
        list: Vec<u32>,
    }

    #[test]
    fn nullable_accepts_missing_and_null() {
        let missing: Payload = serde_json::from_str("{}").unwrap();
        let null: Payload = serde_json::from_str("{\"list\": null}").unwrap();
        let given: Payload = serde_json::from_str("{\"list\": [1, 2]}").unwrap();
        assert!(missing.list.is_empty());
        assert!(null.list.is_empty());
        assert_eq!(given.list, vec![1, 2]);
    }

    #[test]
    fn decode_reports_url_on_bad_shape() {
        let err = decode::<Vec<u32>>("http://provider/x", "{\"not\":\"a list\"}").unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
        assert!(err.to_string().contains("http://provider/x"));
    }
}
