//! Jupiter Price API client
//!
//! Serves token prices in SOL terms for position entry pricing and
//! threshold evaluation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::ports::chain::NATIVE_MINT;
use crate::ports::price::{PriceError, PriceFeed};

const JUPITER_PRICE_API: &str = "https://price.jup.ag/v6/price";

#[derive(Debug, Clone)]
pub struct JupiterPriceClient {
    http: Client,
    api_url: String,
}

impl JupiterPriceClient {
    pub fn new() -> Result<Self, PriceError> {
        Self::with_url(JUPITER_PRICE_API.to_string())
    }

    pub fn with_url(api_url: String) -> Result<Self, PriceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PriceError::Unavailable(e.to_string()))?;
        Ok(Self { http, api_url })
    }

    async fn fetch(&self, ids: &str) -> Result<PriceResponse, PriceError> {
        let url = format!("{}?ids={}", self.api_url, ids);

        self.http
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| PriceError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl PriceFeed for JupiterPriceClient {
    /// Price of one token of `mint` in SOL, derived from the pair of
    /// quoted prices.
    async fn token_price(&self, mint: &str) -> Result<f64, PriceError> {
        let response = self.fetch(&format!("{},{}", mint, NATIVE_MINT)).await?;

        let token = response
            .data
            .get(mint)
            .map(|p| p.price)
            .ok_or_else(|| PriceError::NoPriceData(mint.to_string()))?;

        let sol = response
            .data
            .get(NATIVE_MINT)
            .map(|p| p.price)
            .ok_or_else(|| PriceError::NoPriceData(NATIVE_MINT.to_string()))?;

        if sol <= 0.0 {
            return Err(PriceError::NoPriceData(NATIVE_MINT.to_string()));
        }

        Ok(token / sol)
    }
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    data: HashMap<String, PriceData>,
}

#[derive(Debug, Deserialize)]
struct PriceData {
    price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_response_parsing() {
        let json = format!(
            r#"{{"data":{{"MintA":{{"id":"MintA","price":0.5}},"{}":{{"id":"{}","price":150.0}}}},"timeTaken":0.01}}"#,
            NATIVE_MINT, NATIVE_MINT
        );
        let response: PriceResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.data["MintA"].price, 0.5);
        assert_eq!(response.data[NATIVE_MINT].price, 150.0);
    }
}
