//! Mock port implementations
//!
//! Programmable in-memory implementations of every port, recording calls
//! and serving controlled responses. Used by unit and integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::chain::{AssetDelta, ChainError, ChainReader};
use super::feed::{EventFeed, FeedError};
use super::price::{PriceError, PriceFeed};
use super::signer::{SignerError, TransactionSigner};
use super::venue::{TradeRequest, VenueClient, VenueError};

/// Mock event feed recording watch/unwatch calls
#[derive(Debug, Default)]
pub struct MockFeed {
    watched: Arc<Mutex<HashSet<String>>>,
    fail_registration: Arc<Mutex<bool>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent watch/unwatch calls fail
    pub fn set_failing(&self, failing: bool) {
        *self.fail_registration.lock().unwrap() = failing;
    }

    pub fn watched_wallets(&self) -> HashSet<String> {
        self.watched.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventFeed for MockFeed {
    async fn watch(&self, wallet: &str) -> Result<(), FeedError> {
        if *self.fail_registration.lock().unwrap() {
            return Err(FeedError::RegistrationFailed {
                wallet: wallet.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        self.watched.lock().unwrap().insert(wallet.to_string());
        Ok(())
    }

    async fn unwatch(&self, wallet: &str) -> Result<(), FeedError> {
        if *self.fail_registration.lock().unwrap() {
            return Err(FeedError::RegistrationFailed {
                wallet: wallet.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        self.watched.lock().unwrap().remove(wallet);
        Ok(())
    }

    async fn watched(&self) -> Vec<String> {
        self.watched.lock().unwrap().iter().cloned().collect()
    }
}

/// Mock chain reader with programmable deltas, balances and submissions
#[derive(Debug, Default)]
pub struct MockChain {
    deltas: Mutex<HashMap<String, Vec<AssetDelta>>>,
    balances: Mutex<HashMap<(String, String), f64>>,
    submitted: Mutex<Vec<Vec<u8>>>,
    next_signature: AtomicU64,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program the balance deltas returned for a signature
    pub fn set_deltas(&self, signature: &str, deltas: Vec<AssetDelta>) {
        self.deltas
            .lock()
            .unwrap()
            .insert(signature.to_string(), deltas);
    }

    pub fn set_balance(&self, owner: &str, mint: &str, balance: f64) {
        self.balances
            .lock()
            .unwrap()
            .insert((owner.to_string(), mint.to_string()), balance);
    }

    /// Signed payloads submitted through this mock
    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn transaction_deltas(
        &self,
        _wallet: &str,
        signature: &str,
    ) -> Result<Vec<AssetDelta>, ChainError> {
        self.deltas
            .lock()
            .unwrap()
            .get(signature)
            .cloned()
            .ok_or_else(|| ChainError::TransactionNotFound(signature.to_string()))
    }

    async fn token_balance(&self, owner: &str, mint: &str) -> Result<f64, ChainError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(owner.to_string(), mint.to_string()))
            .copied()
            .unwrap_or(0.0))
    }

    async fn submit_transaction(&self, signed_tx: &[u8]) -> Result<String, ChainError> {
        self.submitted.lock().unwrap().push(signed_tx.to_vec());
        let n = self.next_signature.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mock_signature_{}", n))
    }
}

/// Mock venue with programmable rejections
#[derive(Debug, Default)]
pub struct MockVenue {
    /// Number of attempts to reject before accepting
    reject_first: Mutex<u32>,
    /// Reject every attempt
    always_reject: Mutex<bool>,
    requests: Mutex<Vec<TradeRequest>>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the first `n` build attempts, then accept
    pub fn reject_first(&self, n: u32) {
        *self.reject_first.lock().unwrap() = n;
    }

    /// Reject every build attempt
    pub fn set_always_reject(&self, reject: bool) {
        *self.always_reject.lock().unwrap() = reject;
    }

    /// Every trade request received, in order
    pub fn requests(&self) -> Vec<TradeRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Amounts requested across all attempts, in order
    pub fn requested_amounts(&self) -> Vec<f64> {
        self.requests.lock().unwrap().iter().map(|r| r.amount).collect()
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    async fn build_swap_transaction(&self, request: &TradeRequest) -> Result<Vec<u8>, VenueError> {
        self.requests.lock().unwrap().push(request.clone());

        if *self.always_reject.lock().unwrap() {
            return Err(VenueError::Rejected("insufficient liquidity".to_string()));
        }

        let mut remaining = self.reject_first.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(VenueError::Rejected("slippage tolerance exceeded".to_string()));
        }

        // Unsigned payload; the mock signer passes it through unchanged
        Ok(format!("unsigned:{}:{}", request.action, request.amount).into_bytes())
    }
}

/// Mock price feed serving fixed per-mint prices
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    prices: Mutex<HashMap<String, f64>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, mint: &str, price: f64) {
        self.prices.lock().unwrap().insert(mint.to_string(), price);
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn token_price(&self, mint: &str) -> Result<f64, PriceError> {
        self.prices
            .lock()
            .unwrap()
            .get(mint)
            .copied()
            .ok_or_else(|| PriceError::NoPriceData(mint.to_string()))
    }
}

/// Mock signer that accepts every known wallet and passes payloads through
#[derive(Debug, Default)]
pub struct MockSigner {
    known: Mutex<HashSet<String>>,
    signed: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallet(self, wallet: &str) -> Self {
        self.known.lock().unwrap().insert(wallet.to_string());
        self
    }

    pub fn add_wallet(&self, wallet: &str) {
        self.known.lock().unwrap().insert(wallet.to_string());
    }

    pub fn signed_count(&self) -> usize {
        self.signed.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn has_key(&self, wallet: &str) -> bool {
        self.known.lock().unwrap().contains(wallet)
    }

    async fn sign(&self, wallet: &str, unsigned_tx: &[u8]) -> Result<Vec<u8>, SignerError> {
        if !self.has_key(wallet) {
            return Err(SignerError::UnknownWallet(wallet.to_string()));
        }
        self.signed
            .lock()
            .unwrap()
            .push((wallet.to_string(), unsigned_tx.to_vec()));
        Ok(unsigned_tx.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::chain::NATIVE_MINT;

    #[tokio::test]
    async fn test_mock_feed_watch_unwatch() {
        let feed = MockFeed::new();
        feed.watch("master1").await.unwrap();
        assert!(feed.watched_wallets().contains("master1"));
        feed.unwatch("master1").await.unwrap();
        assert!(feed.watched_wallets().is_empty());
    }

    #[tokio::test]
    async fn test_mock_feed_failure() {
        let feed = MockFeed::new();
        feed.set_failing(true);
        assert!(feed.watch("master1").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_chain_deltas() {
        let chain = MockChain::new();
        chain.set_deltas(
            "sig1",
            vec![AssetDelta {
                mint: NATIVE_MINT.to_string(),
                delta: -1.0,
                pre_amount: 10.0,
            }],
        );

        let deltas = chain.transaction_deltas("wallet", "sig1").await.unwrap();
        assert_eq!(deltas.len(), 1);

        let missing = chain.transaction_deltas("wallet", "sig2").await;
        assert!(matches!(missing, Err(ChainError::TransactionNotFound(_))));
    }

    #[tokio::test]
    async fn test_mock_venue_rejects_then_accepts() {
        let venue = MockVenue::new();
        venue.reject_first(2);

        let req = TradeRequest::buy("w".into(), "m".into(), 1.0, 10.0);
        assert!(venue.build_swap_transaction(&req).await.is_err());
        assert!(venue.build_swap_transaction(&req).await.is_err());
        assert!(venue.build_swap_transaction(&req).await.is_ok());
        assert_eq!(venue.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_signer_unknown_wallet() {
        let signer = MockSigner::new().with_wallet("known");
        assert!(signer.sign("known", b"tx").await.is_ok());
        assert!(matches!(
            signer.sign("unknown", b"tx").await,
            Err(SignerError::UnknownWallet(_))
        ));
    }
}
