//! Chain Event Feed Port
//!
//! The engine consumes wallet activity as a push interface: the feed
//! adapter delivers `{wallet, signature}` notifications over a bounded
//! channel, and the tracking registry registers/unregisters interest per
//! wallet through this trait.

use async_trait::async_trait;
use thiserror::Error;

/// Raw notification that a watched wallet produced a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletEvent {
    /// Watched master wallet (base58)
    pub wallet: String,
    /// Transaction signature
    pub signature: String,
}

#[derive(Debug, Error)]
pub enum FeedError {
    /// The adapter could not (un)register interest; retried on the next
    /// registry rebuild pass, never fatal.
    #[error("Registration failed for {wallet}: {reason}")]
    RegistrationFailed { wallet: String, reason: String },
    #[error("Event channel closed")]
    ChannelClosed,
}

/// Push-interface registration with the chain event feed
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Start delivering events for this wallet
    async fn watch(&self, wallet: &str) -> Result<(), FeedError>;

    /// Stop delivering events for this wallet
    async fn unwatch(&self, wallet: &str) -> Result<(), FeedError>;

    /// Wallets currently being watched (for reconcile/debugging)
    async fn watched(&self) -> Vec<String>;
}
