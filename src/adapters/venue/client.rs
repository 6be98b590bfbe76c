//! PumpPortal Trading API Client
//!
//! HTTP client for the PumpPortal local-transaction endpoint. The engine
//! POSTs trade parameters and receives a serialized unsigned transaction
//! to be signed locally and submitted through its own RPC connection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::ports::venue::{TradeRequest, VenueClient, VenueError};

/// PumpPortal API client configuration
#[derive(Debug, Clone)]
pub struct VenueConfig {
    /// Base URL for the trade-local endpoint
    pub api_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Number of retry attempts for transport-level failures
    pub max_retries: u32,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            api_url: "https://pumpportal.fun/api/trade-local".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// PumpPortal local-transaction client
#[derive(Debug, Clone)]
pub struct PumpPortalClient {
    config: VenueConfig,
    http: Client,
}

impl PumpPortalClient {
    pub fn new() -> Result<Self, VenueError> {
        Self::with_config(VenueConfig::default())
    }

    pub fn with_config(config: VenueConfig) -> Result<Self, VenueError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VenueError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Execute request with retry logic and rate limit handling
    async fn execute_with_retry<F, Fut>(&self, request_fn: F) -> Result<reqwest::Response, VenueError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, VenueError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match request_fn().await {
                Ok(response) => {
                    if response.status().is_success() || response.status() == StatusCode::BAD_REQUEST {
                        return Ok(response);
                    }

                    // Handle rate limiting (429) with exponential backoff
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        let backoff = Duration::from_secs(2u64.pow(attempt + 1)); // 2s, 4s, 8s
                        tracing::warn!(
                            "Rate limited (429), backing off for {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.config.max_retries
                        );
                        last_error = Some(VenueError::RateLimited);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    // Retry on server errors (5xx)
                    if response.status().is_server_error() {
                        last_error = Some(VenueError::Api(format!(
                            "Server error: {}",
                            response.status()
                        )));
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| VenueError::Api("Max retries exceeded".into())))
    }
}

#[async_trait]
impl VenueClient for PumpPortalClient {
    async fn build_swap_transaction(&self, request: &TradeRequest) -> Result<Vec<u8>, VenueError> {
        let req = self.http.post(&self.config.api_url).json(request);

        let response = self
            .execute_with_retry(|| async {
                req.try_clone()
                    .ok_or_else(|| VenueError::Api("Failed to clone request".into()))?
                    .send()
                    .await
                    .map_err(|e| VenueError::Api(e.to_string()))
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            // A non-success body means the venue declined to build the
            // trade (liquidity, slippage, balance); the swap client's
            // adaptive-amount retry decides what happens next.
            let body = response.text().await.unwrap_or_default();
            return Err(VenueError::Rejected(format!("{}: {}", status, body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VenueError::Api(format!("Failed to read transaction body: {}", e)))?;

        if bytes.is_empty() {
            return Err(VenueError::Api("Venue returned empty transaction".into()));
        }

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VenueConfig::default();
        assert!(config.api_url.contains("trade-local"));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_client_creation() {
        assert!(PumpPortalClient::new().is_ok());
    }
}
