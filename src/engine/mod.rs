//! Copy-Trade Engine
//!
//! Wires the pipeline together and runs the event loop: the tracking
//! registry keeps the feed watching the right master wallets, incoming
//! events fan out through the replicator, and a periodic price sweep
//! evaluates TP/SL thresholds for manually-managed positions.

pub mod classifier;
pub mod positions;
pub mod replicator;
pub mod store;
pub mod swap;
pub mod tracking;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{error, info, warn};

use crate::domain::ExitPolicy;
use crate::ports::feed::WalletEvent;
use crate::ports::price::PriceFeed;
use positions::PositionManager;
use replicator::Replicator;
use store::SubscriptionStore;
use tracking::TrackingRegistry;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between tracking-registry rebuild passes
    pub rebuild_interval: Duration,
    /// Interval between TP/SL price sweeps
    pub price_check_interval: Duration,
    /// Minimum effective sizing amount, in SOL
    pub dust_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rebuild_interval: Duration::from_secs(30),
            price_check_interval: Duration::from_secs(15),
            dust_threshold: 0.001,
        }
    }
}

pub struct CopyTradeEngine {
    registry: Arc<TrackingRegistry>,
    replicator: Arc<Replicator>,
    positions: Arc<PositionManager>,
    subscriptions: Arc<SubscriptionStore>,
    price: Arc<dyn PriceFeed>,
    event_rx: Mutex<Option<mpsc::Receiver<WalletEvent>>>,
    is_running: Arc<RwLock<bool>>,
    config: EngineConfig,
}

impl CopyTradeEngine {
    pub fn new(
        registry: Arc<TrackingRegistry>,
        replicator: Arc<Replicator>,
        positions: Arc<PositionManager>,
        subscriptions: Arc<SubscriptionStore>,
        price: Arc<dyn PriceFeed>,
        event_rx: mpsc::Receiver<WalletEvent>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            replicator,
            positions,
            subscriptions,
            price,
            event_rx: Mutex::new(Some(event_rx)),
            is_running: Arc::new(RwLock::new(false)),
            config,
        }
    }

    /// Run the engine event loop until the feed closes or `stop` is called
    pub async fn run(&self) {
        {
            let mut running = self.is_running.write().await;
            if *running {
                warn!("Engine already running");
                return;
            }
            *running = true;
        }

        let mut event_rx = match self.event_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                error!("Engine event receiver already consumed");
                return;
            }
        };

        info!(
            rebuild_interval = ?self.config.rebuild_interval,
            price_check_interval = ?self.config.price_check_interval,
            "Copy-trade engine starting"
        );

        // Seed the watched-wallet set before consuming events
        self.registry
            .rebuild(&self.subscriptions.all(), self.config.dust_threshold)
            .await;

        let mut rebuild_tick = tokio::time::interval(self.config.rebuild_interval);
        let mut price_tick = tokio::time::interval(self.config.price_check_interval);
        rebuild_tick.tick().await;
        price_tick.tick().await;

        while *self.is_running.read().await {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(event) => {
                            let replicator = Arc::clone(&self.replicator);
                            tokio::spawn(async move {
                                replicator.handle_event(event).await;
                            });
                        }
                        None => {
                            warn!("Event feed closed, stopping engine");
                            break;
                        }
                    }
                }
                _ = rebuild_tick.tick() => {
                    self.registry
                        .rebuild(&self.subscriptions.all(), self.config.dust_threshold)
                        .await;
                }
                _ = price_tick.tick() => {
                    self.price_sweep().await;
                }
            }
        }

        *self.is_running.write().await = false;
        info!("Copy-trade engine stopped");
    }

    /// Request shutdown of the event loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Evaluate TP/SL thresholds for every open manually-managed position
    async fn price_sweep(&self) {
        let subscriptions = self.subscriptions.all();

        for position in self.positions.open_positions().await {
            let Some(subscription) = subscriptions
                .iter()
                .find(|s| s.id == position.subscription_id)
            else {
                continue;
            };
            if subscription.exit_policy != ExitPolicy::Manual {
                continue;
            }

            match self.price.token_price(&position.mint).await {
                Ok(price) => {
                    self.positions
                        .evaluate_price(subscription, &position.mint, price)
                        .await;
                }
                Err(e) => {
                    warn!(mint = %position.mint, error = %e, "Price sweep lookup failed");
                }
            }
        }
    }
}
