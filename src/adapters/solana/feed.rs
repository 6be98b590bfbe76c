//! Wallet signature poller
//!
//! Polls recent transaction signatures for every watched wallet and
//! pushes new observations over a bounded channel as [`WalletEvent`]s.
//! The first poll for a wallet seeds its seen-set without emitting, so
//! watching a wallet never replays its history. Delivery is
//! at-least-once; downstream dedup is handled by the processed ledger.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::rpc::SolanaClient;
use crate::ports::feed::{EventFeed, FeedError, WalletEvent};

/// Signatures remembered per wallet before old entries are evicted
const SEEN_CAPACITY: usize = 256;

/// Configuration for the signature poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between poll sweeps
    pub poll_interval: Duration,
    /// Event channel buffer size
    pub channel_buffer_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            channel_buffer_size: 256,
        }
    }
}

/// Per-wallet polling state
#[derive(Debug, Default)]
struct WalletState {
    seen: HashSet<String>,
    order: VecDeque<String>,
    seeded: bool,
}

impl WalletState {
    fn remember(&mut self, signature: String) -> bool {
        if self.seen.contains(&signature) {
            return false;
        }
        self.seen.insert(signature.clone());
        self.order.push_back(signature);
        while self.order.len() > SEEN_CAPACITY {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

/// Polls watched wallets for new transaction signatures
pub struct SignaturePoller {
    config: PollerConfig,
    client: SolanaClient,
    event_tx: mpsc::Sender<WalletEvent>,
    wallets: Arc<RwLock<HashMap<String, WalletState>>>,
    is_running: Arc<RwLock<bool>>,
}

impl SignaturePoller {
    /// Create the poller and the receiver for its events
    pub fn new(config: PollerConfig, client: SolanaClient) -> (Self, mpsc::Receiver<WalletEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);

        let poller = Self {
            config,
            client,
            event_tx,
            wallets: Arc::new(RwLock::new(HashMap::new())),
            is_running: Arc::new(RwLock::new(false)),
        };

        (poller, event_rx)
    }

    /// Run the poll loop until shutdown is requested
    pub async fn run(&self) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Signature poller already running");
                return;
            }
            *running = true;
        }
        info!("Signature poller started");

        while *self.is_running.read().await {
            self.poll_once().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!("Signature poller stopped");
    }

    /// Request shutdown of the poll loop
    pub async fn shutdown(&self) {
        *self.is_running.write().await = false;
    }

    async fn poll_once(&self) {
        let targets: Vec<String> = self.wallets.read().await.keys().cloned().collect();

        for wallet in targets {
            let signatures = match self.client.recent_signatures(&wallet).await {
                Ok(sigs) => sigs,
                Err(e) => {
                    warn!(wallet = %wallet, error = %e, "Signature poll failed");
                    continue;
                }
            };

            // Oldest first so events are emitted in chain order
            for signature in signatures.into_iter().rev() {
                let event = {
                    let mut wallets = self.wallets.write().await;
                    let Some(state) = wallets.get_mut(&wallet) else {
                        // Unwatched mid-sweep
                        break;
                    };
                    let fresh = state.remember(signature.clone());
                    let seeded = state.seeded;
                    if fresh && seeded {
                        Some(WalletEvent {
                            wallet: wallet.clone(),
                            signature,
                        })
                    } else {
                        None
                    }
                };

                if let Some(event) = event {
                    debug!(wallet = %event.wallet, signature = %event.signature, "New wallet activity");
                    // Blocks when the engine falls behind; backpressure
                    // instead of dropped events.
                    if self.event_tx.send(event).await.is_err() {
                        warn!("Event channel closed, stopping poller");
                        self.shutdown().await;
                        return;
                    }
                }
            }

            let mut wallets = self.wallets.write().await;
            if let Some(state) = wallets.get_mut(&wallet) {
                state.seeded = true;
            }
        }
    }
}

#[async_trait]
impl EventFeed for SignaturePoller {
    async fn watch(&self, wallet: &str) -> Result<(), FeedError> {
        let mut wallets = self.wallets.write().await;
        wallets
            .entry(wallet.to_string())
            .or_insert_with(WalletState::default);
        debug!(wallet = %wallet, "Watching wallet");
        Ok(())
    }

    async fn unwatch(&self, wallet: &str) -> Result<(), FeedError> {
        self.wallets.write().await.remove(wallet);
        debug!(wallet = %wallet, "Unwatched wallet");
        Ok(())
    }

    async fn watched(&self) -> Vec<String> {
        self.wallets.read().await.keys().cloned().collect()
    }
}
