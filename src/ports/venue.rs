//! Venue Port
//!
//! The liquidity venue quotes off-chain: the engine POSTs trade
//! parameters and receives a serialized unsigned transaction, which is
//! signed locally and submitted to the chain by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trade parameters sent to the venue quoting API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    /// Follower wallet public key (base58)
    pub public_key: String,
    /// "buy" or "sell"
    pub action: String,
    /// Token mint being bought or sold
    pub mint: String,
    /// Whether `amount` is denominated in SOL (buys) or tokens (sells)
    pub denominated_in_sol: bool,
    pub amount: f64,
    /// Slippage tolerance in percent
    pub slippage: f64,
    /// Priority fee in SOL
    pub priority_fee: f64,
    /// Liquidity pool to route through
    pub pool: String,
}

impl TradeRequest {
    pub fn buy(public_key: String, mint: String, sol_amount: f64, slippage: f64) -> Self {
        Self {
            public_key,
            action: "buy".to_string(),
            mint,
            denominated_in_sol: true,
            amount: sol_amount,
            slippage,
            priority_fee: 0.00001,
            pool: "pump".to_string(),
        }
    }

    pub fn sell(public_key: String, mint: String, token_amount: f64, slippage: f64) -> Self {
        Self {
            public_key,
            action: "sell".to_string(),
            mint,
            denominated_in_sol: false,
            amount: token_amount,
            slippage,
            priority_fee: 0.00001,
            pool: "pump".to_string(),
        }
    }

    pub fn with_priority_fee(mut self, priority_fee: f64) -> Self {
        self.priority_fee = priority_fee;
        self
    }

    pub fn with_pool(mut self, pool: String) -> Self {
        self.pool = pool;
        self
    }
}

#[derive(Debug, Error)]
pub enum VenueError {
    /// The venue declined to build the trade (liquidity/slippage); the
    /// adaptive-amount retry in the swap client handles this.
    #[error("Venue rejected trade: {0}")]
    Rejected(String),
    #[error("Venue rate limited")]
    RateLimited,
    #[error("Venue API error: {0}")]
    Api(String),
}

/// Off-chain quoting API that returns unsigned transactions
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Build an unsigned swap transaction for the given trade parameters
    async fn build_swap_transaction(&self, request: &TradeRequest) -> Result<Vec<u8>, VenueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_request() {
        let req = TradeRequest::buy("wallet".into(), "mint".into(), 1.5, 10.0);
        assert_eq!(req.action, "buy");
        assert!(req.denominated_in_sol);
        assert_eq!(req.amount, 1.5);
    }

    #[test]
    fn test_sell_request() {
        let req = TradeRequest::sell("wallet".into(), "mint".into(), 500.0, 10.0);
        assert_eq!(req.action, "sell");
        assert!(!req.denominated_in_sol);
    }

    #[test]
    fn test_request_serialization_camel_case() {
        let req = TradeRequest::buy("wallet".into(), "mint".into(), 1.0, 10.0)
            .with_priority_fee(0.0002)
            .with_pool("auto".into());

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["publicKey"], "wallet");
        assert_eq!(json["denominatedInSol"], true);
        assert_eq!(json["priorityFee"], 0.0002);
        assert_eq!(json["pool"], "auto");
    }
}
