//! Price Feed Port
//!
//! Token price lookups in SOL terms, used for position entry pricing and
//! TP/SL threshold evaluation.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("No price data for mint: {0}")]
    NoPriceData(String),
    #[error("Price feed unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current price of one token of `mint`, in SOL
    async fn token_price(&self, mint: &str) -> Result<f64, PriceError>;
}
