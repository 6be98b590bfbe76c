//! Trade Replication Orchestrator
//!
//! Drives one incoming wallet event through the pipeline: dedup and
//! exclusion gating, classification, fan-out to every active
//! subscription of the master. Buys execute directly through the swap
//! client with per-subscription sizing; sells delegate to the position
//! manager because sell sizing depends on open position state. Every
//! attempt writes an execution record, success or failure.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::classifier::{ClassifiedSwap, TransactionClassifier};
use super::positions::PositionManager;
use super::store::{StateStore, SubscriptionStore};
use super::swap::SwapClient;
use crate::domain::{DedupLedger, ExecutionRecord, ExitPolicy, Subscription, TradeDirection};
use crate::ports::feed::WalletEvent;
use crate::ports::price::PriceFeed;
use crate::ports::signer::TransactionSigner;

#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// Buy amount used under the venue-default sizing policy, in SOL
    pub venue_default_amount: f64,
    /// Minimum effective buy amount, in SOL
    pub dust_threshold: f64,
    /// Slippage for replicated buys, in percent
    pub default_slippage: f64,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            venue_default_amount: 0.1,
            dust_threshold: 0.001,
            default_slippage: 10.0,
        }
    }
}

pub struct Replicator {
    ledger: Arc<DedupLedger>,
    classifier: TransactionClassifier,
    swap: Arc<SwapClient>,
    positions: Arc<PositionManager>,
    price: Arc<dyn PriceFeed>,
    signer: Arc<dyn TransactionSigner>,
    subscriptions: Arc<SubscriptionStore>,
    store: Arc<StateStore>,
    config: ReplicatorConfig,
}

impl Replicator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<DedupLedger>,
        classifier: TransactionClassifier,
        swap: Arc<SwapClient>,
        positions: Arc<PositionManager>,
        price: Arc<dyn PriceFeed>,
        signer: Arc<dyn TransactionSigner>,
        subscriptions: Arc<SubscriptionStore>,
        store: Arc<StateStore>,
        config: ReplicatorConfig,
    ) -> Self {
        Self {
            ledger,
            classifier,
            swap,
            positions,
            price,
            signer,
            subscriptions,
            store,
            config,
        }
    }

    /// Process one raw wallet event end to end
    pub async fn handle_event(self: Arc<Self>, event: WalletEvent) {
        if self.ledger.is_excluded(&event.signature) {
            debug!(signature = %event.signature, "Excluded transaction, dropping");
            return;
        }

        // Mark before any side effect so a concurrent duplicate delivery
        // observes the signature as processed
        if !self.ledger.mark_processed(&event.signature) {
            debug!(signature = %event.signature, "Already processed, dropping");
            return;
        }

        let classified = match self.classifier.classify(&event.wallet, &event.signature).await {
            Ok(c) => c,
            Err(e) => {
                debug!(
                    wallet = %event.wallet,
                    signature = %event.signature,
                    error = %e,
                    "Dropping unclassifiable event"
                );
                return;
            }
        };

        let subscriptions = self
            .subscriptions
            .active_for_master(&event.wallet, self.config.dust_threshold);
        if subscriptions.is_empty() {
            debug!(wallet = %event.wallet, "No active subscriptions for master");
            return;
        }

        info!(
            wallet = %event.wallet,
            signature = %event.signature,
            direction = ?classified.direction,
            subscriptions = subscriptions.len(),
            "Replicating classified swap"
        );

        // One task per subscription; failures stay isolated
        let mut handles = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let this = Arc::clone(&self);
            let classified = classified.clone();
            handles.push(tokio::spawn(async move {
                this.replicate_for(&subscription, &classified).await;
            }));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Replication task panicked");
            }
        }
    }

    async fn replicate_for(&self, subscription: &Subscription, classified: &ClassifiedSwap) {
        match classified.direction {
            TradeDirection::Buy => self.replicate_buy(subscription, classified).await,
            TradeDirection::Sell => self.replicate_sell(subscription, classified).await,
        }
    }

    async fn replicate_buy(&self, subscription: &Subscription, classified: &ClassifiedSwap) {
        let mint = &classified.output_mint;
        let record = ExecutionRecord::pending(
            subscription.id,
            classified.signature.clone(),
            mint.clone(),
            TradeDirection::Buy,
        );

        if !self.signer.has_key(&subscription.follower_wallet) {
            warn!(
                subscription = subscription.id,
                follower = %subscription.follower_wallet,
                "No key material for follower, skipping"
            );
            self.append_record(record.failed("no key material for follower".into()));
            return;
        }

        let amount = subscription
            .replication_amount(classified.master_native_spent, self.config.venue_default_amount);
        if amount <= self.config.dust_threshold {
            debug!(
                subscription = subscription.id,
                amount, "Replication amount below dust threshold, skipping"
            );
            self.append_record(record.failed(format!(
                "replication amount {} at or below dust threshold {}",
                amount, self.config.dust_threshold
            )));
            return;
        }

        let outcome = self
            .swap
            .swap(
                &subscription.follower_wallet,
                mint,
                amount,
                self.config.default_slippage,
                TradeDirection::Buy,
                false,
            )
            .await;

        match outcome {
            Ok(outcome) => {
                let price = match self.price.token_price(mint).await {
                    Ok(p) if p > 0.0 => Some(p),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(mint = %mint, error = %e, "Price lookup failed after buy");
                        None
                    }
                };

                self.append_record(record.succeeded(
                    price,
                    outcome.executed_amount,
                    outcome.signature.clone(),
                ));

                if subscription.manages_positions() {
                    match price {
                        Some(price) => {
                            let token_amount = outcome.executed_amount / price;
                            if let Err(e) = self
                                .positions
                                .record_buy(subscription, mint, price, token_amount)
                                .await
                            {
                                warn!(
                                    subscription = subscription.id,
                                    mint = %mint,
                                    error = %e,
                                    "Failed to record position for buy"
                                );
                            }
                        }
                        None => {
                            warn!(
                                subscription = subscription.id,
                                mint = %mint,
                                "No entry price available, buy left unmanaged"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                self.append_record(record.failed(e.to_string()));
            }
        }
    }

    async fn replicate_sell(&self, subscription: &Subscription, classified: &ClassifiedSwap) {
        let mint = &classified.input_mint;

        match subscription.exit_policy {
            ExitPolicy::Auto => {
                let attempt = self
                    .positions
                    .mirror_master_sell(subscription, mint, classified.master_sold_fraction)
                    .await;

                // No open position means nothing was attempted; no record
                if let Some(attempt) = attempt {
                    let record = ExecutionRecord::pending(
                        subscription.id,
                        classified.signature.clone(),
                        mint.clone(),
                        TradeDirection::Sell,
                    );
                    match attempt.result {
                        Ok(outcome) => self.append_record(record.succeeded(
                            None,
                            outcome.executed_amount,
                            outcome.signature,
                        )),
                        Err(e) => self.append_record(record.failed(e.to_string())),
                    }
                }
            }
            ExitPolicy::Manual => {
                // Master activity does not drive manual exits, but the
                // event is a natural moment to re-check thresholds
                if let Ok(price) = self.price.token_price(mint).await {
                    self.positions
                        .evaluate_price(subscription, mint, price)
                        .await;
                }
            }
            ExitPolicy::None => {
                debug!(
                    subscription = subscription.id,
                    mint = %mint,
                    "Exit policy none, master sell not mirrored"
                );
            }
        }
    }

    fn append_record(&self, record: ExecutionRecord) {
        if let Err(e) = self.store.append_record(record) {
            warn!(error = %e, "Failed to persist execution record");
        }
    }
}
