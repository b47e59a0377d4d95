// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP client used for chunk downloads.
//!
//! This module provides a low-level HTTP client with:
//! - Connection pooling
//! - Connection-level retry with exponential backoff for throttling and
//!   gateway errors
//! - Configurable timeouts
//!
//! Chunk URLs are presigned, so no session authentication is attached here;
//! per-chunk credentials travel in the headers of each request.

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Read timeout duration.
    pub read_timeout: Duration,
    /// Maximum number of connection-level retry attempts.
    pub max_retries: u32,
    /// Base delay between retry attempts (doubles each retry).
    pub retry_delay: Duration,
    /// Maximum number of idle connections per host.
    pub max_connections_per_host: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            max_retries: 5,
            retry_delay: Duration::from_millis(500),
            max_connections_per_host: 100,
            user_agent: format!("WarehouseRustDriver/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client for fetching result chunks.
#[derive(Debug, Clone)]
pub struct WarehouseHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl WarehouseHttpClient {
    /// Creates a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Issue a GET with the given headers.
    ///
    /// Retries are performed beneath the caller for:
    /// - Connect and timeout errors
    /// - 429 Too Many Requests
    /// - 502 Bad Gateway
    /// - 503 Service Unavailable
    /// - 504 Gateway Timeout
    ///
    /// Any other non-success status is returned immediately as a
    /// `Transport` error carrying the status code.
    pub async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<Response> {
        let header_map = Self::build_headers(headers)?;
        let mut attempts = 0;

        loop {
            attempts += 1;

            debug!(
                "Executing GET {} (attempt {}/{})",
                redact_url(url),
                attempts,
                self.config.max_retries + 1
            );

            let result = self
                .client
                .get(url)
                .headers(header_map.clone())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if Self::is_retryable_status(status) && attempts <= self.config.max_retries {
                        warn!(
                            "Request failed with {} (attempt {}/{}), retrying...",
                            status,
                            attempts,
                            self.config.max_retries + 1
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }

                    let error_body = response.text().await.unwrap_or_default();
                    return Err(Error::http_status(status.as_u16(), error_body));
                }
                Err(e) => {
                    if Self::is_retryable_error(&e) && attempts <= self.config.max_retries {
                        warn!(
                            "Request failed with error (attempt {}/{}): {}, retrying...",
                            attempts,
                            self.config.max_retries + 1,
                            e
                        );
                        self.wait_for_retry(attempts).await;
                        continue;
                    }

                    return Err(Error::transport(format!(
                        "HTTP request failed after {} attempts: {}",
                        attempts, e
                    )));
                }
            }
        }
    }

    fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (key, value) in headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::manifest(format!("invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::manifest(format!("invalid value for header '{}': {}", key, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Check if the HTTP status code indicates a retryable error.
    fn is_retryable_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

    /// Check if the request error is retryable.
    fn is_retryable_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    /// Wait with exponential backoff before retry.
    async fn wait_for_retry(&self, attempt: u32) {
        let delay = self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        debug!("Waiting {:?} before retry", delay);
        sleep(delay).await;
    }
}

/// Strip the query string so presigned credentials never reach the logs.
pub(crate) fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
