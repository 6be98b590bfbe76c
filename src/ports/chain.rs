//! Chain Reader Port
//!
//! Balance queries, parsed-transaction lookups and signed-transaction
//! submission. The concrete adapter wraps a Solana RPC client; rate
//! limiting (HTTP 429) is handled inside the adapter with exponential
//! backoff and a bounded retry count.

use async_trait::async_trait;
use thiserror::Error;

/// The wrapped native asset mint (SOL)
pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

/// Per-asset balance change observed for one wallet in one transaction
#[derive(Debug, Clone, PartialEq)]
pub struct AssetDelta {
    /// Token mint (or [`NATIVE_MINT`] for SOL)
    pub mint: String,
    /// Signed balance change in UI units
    pub delta: f64,
    /// Balance before the transaction in UI units
    pub pre_amount: f64,
}

impl AssetDelta {
    pub fn is_native(&self) -> bool {
        self.mint == NATIVE_MINT
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Rate limited by RPC")]
    RateLimited,
    #[error("RPC request failed: {0}")]
    Rpc(String),
    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),
    #[error("Transaction submission failed: {0}")]
    Submission(String),
}

/// Read access to chain state plus signed-transaction submission
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Balance deltas for `wallet` in the transaction with `signature`,
    /// covering native SOL and every token account owned by the wallet.
    async fn transaction_deltas(
        &self,
        wallet: &str,
        signature: &str,
    ) -> Result<Vec<AssetDelta>, ChainError>;

    /// Current token balance of `owner` for `mint`, in UI units
    async fn token_balance(&self, owner: &str, mint: &str) -> Result<f64, ChainError>;

    /// Submit a fully signed serialized transaction, returning its signature
    async fn submit_transaction(&self, signed_tx: &[u8]) -> Result<String, ChainError>;
}
