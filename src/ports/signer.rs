//! Transaction Signer Port
//!
//! Follower key material is supplied by the out-of-scope custody
//! component; the engine only asks it to sign unsigned venue
//! transactions. The engine never derives or stores keys itself.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("No key material for wallet {0}")]
    UnknownWallet(String),
    #[error("Transaction signing failed: {0}")]
    Signing(String),
    #[error("Malformed transaction payload: {0}")]
    MalformedTransaction(String),
}

/// Signs unsigned serialized transactions on behalf of follower wallets
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Whether key material exists for this follower wallet
    fn has_key(&self, wallet: &str) -> bool;

    /// Sign the unsigned transaction payload for `wallet`, returning the
    /// fully signed serialized transaction.
    async fn sign(&self, wallet: &str, unsigned_tx: &[u8]) -> Result<Vec<u8>, SignerError>;
}
