//! Position Lifecycle Manager
//!
//! Creates, evaluates and closes per-follower positions. All transitions
//! for one (subscription, mint) pair are serialized through a dedicated
//! async mutex so concurrent exit evaluations can never double-close a
//! position; the slot map itself is only locked briefly and never across
//! an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{StateStore, StoreError};
use super::swap::{SwapClient, SwapError, SwapOutcome};
use crate::domain::{
    ExecutionRecord, ExitReason, Position, PositionError, PositionStatus, Subscription,
    TradeDirection,
};

type SlotKey = (u64, String);
type Slot = Arc<tokio::sync::Mutex<Option<Position>>>;

#[derive(Debug, Error)]
pub enum PositionManagerError {
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One attempted exit, successful or not
#[derive(Debug)]
pub struct ExitAttempt {
    pub reason: ExitReason,
    /// Token amount requested from the venue
    pub requested_amount: f64,
    pub result: Result<SwapOutcome, SwapError>,
}

#[derive(Debug, Clone)]
pub struct PositionConfig {
    /// Remaining token amounts below this force a full exit
    pub dust_threshold: f64,
    /// Slippage used for exit swaps, in percent
    pub exit_slippage: f64,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            dust_threshold: 0.001,
            exit_slippage: 10.0,
        }
    }
}

pub struct PositionManager {
    swap: Arc<SwapClient>,
    store: Arc<StateStore>,
    config: PositionConfig,
    slots: Mutex<HashMap<SlotKey, Slot>>,
}

impl PositionManager {
    pub fn new(swap: Arc<SwapClient>, store: Arc<StateStore>, config: PositionConfig) -> Self {
        Self {
            swap,
            store,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Record a successful replicated buy: open a position or merge into
    /// the existing open one (weighted-average entry). Subscriptions with
    /// exit policy `none` never reach here.
    pub async fn record_buy(
        &self,
        subscription: &Subscription,
        mint: &str,
        entry_price: f64,
        token_amount: f64,
    ) -> Result<(), PositionManagerError> {
        let slot = self.slot(subscription.id, mint);
        let mut guard = slot.lock().await;

        match guard.as_mut() {
            Some(position) if position.is_open() => {
                position.merge_buy(entry_price, token_amount)?;
                info!(
                    subscription = subscription.id,
                    mint = %mint,
                    entry_price = position.entry_price,
                    amount = position.amount,
                    "Merged buy into open position"
                );
                self.store.save_position(position)?;
            }
            _ => {
                let position =
                    Position::open(subscription.id, mint.to_string(), entry_price, token_amount)?;
                info!(
                    subscription = subscription.id,
                    mint = %mint,
                    entry_price,
                    amount = token_amount,
                    "Opened position"
                );
                self.store.save_position(&position)?;
                *guard = Some(position);
            }
        }

        Ok(())
    }

    /// Mirror a master sell: exit the same fraction of the follower's
    /// open position. A remainder below the dust threshold (or a full
    /// master exit) forces a full exit instead. Returns `None` when no
    /// open position exists for this pair.
    pub async fn mirror_master_sell(
        &self,
        subscription: &Subscription,
        mint: &str,
        sold_fraction: f64,
    ) -> Option<ExitAttempt> {
        let slot = self.slot(subscription.id, mint);
        let mut guard = slot.lock().await;

        let position = match guard.as_mut() {
            Some(p) if p.is_open() => p,
            _ => {
                debug!(
                    subscription = subscription.id,
                    mint = %mint,
                    "Master sell with no open position, ignoring"
                );
                return None;
            }
        };

        let sell_amount = position.amount * sold_fraction;
        let remainder = position.amount - sell_amount;
        let force_full = sold_fraction >= 1.0 || remainder < self.config.dust_threshold;

        let attempt = self
            .execute_exit(subscription, position, ExitReason::MasterSell, force_full, sell_amount)
            .await;
        Some(attempt)
    }

    /// Evaluate a price update against the subscription's TP/SL
    /// thresholds; a breach forces a full exit regardless of master
    /// activity. Only meaningful under the manual exit policy. The
    /// attempt is recorded here, success or failure, since no master
    /// transaction drives it.
    pub async fn evaluate_price(
        &self,
        subscription: &Subscription,
        mint: &str,
        current_price: f64,
    ) -> Option<ExitAttempt> {
        let slot = self.slot(subscription.id, mint);
        let mut guard = slot.lock().await;

        let position = match guard.as_mut() {
            Some(p) if p.is_open() => p,
            _ => return None,
        };

        let reason = position.threshold_breach(
            current_price,
            subscription.take_profit_pct,
            subscription.stop_loss_pct,
        )?;

        info!(
            subscription = subscription.id,
            mint = %mint,
            entry_price = position.entry_price,
            current_price,
            reason = ?reason,
            "Threshold breached, exiting position"
        );

        let amount = position.amount;
        let mint_name = position.mint.clone();
        let attempt = self
            .execute_exit(subscription, position, reason, true, amount)
            .await;
        self.record_exit_attempt(subscription.id, &mint_name, &attempt);
        Some(attempt)
    }

    /// Persist an execution record for a threshold-driven exit. The
    /// record carries a synthetic trigger tag in place of a master
    /// signature, as no master transaction exists for these exits.
    fn record_exit_attempt(&self, subscription_id: u64, mint: &str, attempt: &ExitAttempt) {
        let tag = match attempt.reason {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::MasterSell => "master_sell",
        };
        let record = ExecutionRecord::pending(
            subscription_id,
            format!("{}:{}", tag, chrono::Utc::now().timestamp_millis()),
            mint.to_string(),
            TradeDirection::Sell,
        );
        let record = match &attempt.result {
            Ok(outcome) => {
                record.succeeded(None, outcome.executed_amount, outcome.signature.clone())
            }
            Err(e) => record.failed(e.to_string()),
        };
        if let Err(e) = self.store.append_record(record) {
            warn!(error = %e, "Failed to persist execution record");
        }
    }

    /// Open positions across all subscriptions (price-monitor sweep,
    /// status reporting)
    pub async fn open_positions(&self) -> Vec<Position> {
        let slots: Vec<Slot> = self.slots.lock().unwrap().values().cloned().collect();

        let mut open = Vec::new();
        for slot in slots {
            let guard = slot.lock().await;
            if let Some(p) = guard.as_ref() {
                if p.is_open() {
                    open.push(p.clone());
                }
            }
        }

        // Persisted positions not yet hydrated into a slot
        for p in self.store.positions() {
            if p.status == PositionStatus::Open
                && !open
                    .iter()
                    .any(|o| o.subscription_id == p.subscription_id && o.mint == p.mint)
            {
                open.push(p);
            }
        }
        open
    }

    /// Run the exit swap and apply the outcome. A failed swap leaves the
    /// position open for re-evaluation on the next trigger.
    async fn execute_exit(
        &self,
        subscription: &Subscription,
        position: &mut Position,
        reason: ExitReason,
        force_full: bool,
        sell_amount: f64,
    ) -> ExitAttempt {
        let requested = if force_full { position.amount } else { sell_amount };

        let result = self
            .swap
            .swap(
                &subscription.follower_wallet,
                &position.mint,
                requested,
                self.config.exit_slippage,
                TradeDirection::Sell,
                force_full,
            )
            .await;

        match &result {
            Ok(outcome) => {
                let applied = if force_full {
                    position.close()
                } else {
                    position.apply_exit(outcome.executed_amount.min(position.amount))
                };
                if let Err(e) = applied {
                    warn!(
                        subscription = subscription.id,
                        mint = %position.mint,
                        error = %e,
                        "Exit executed but position transition failed"
                    );
                }
                if let Err(e) = self.store.save_position(position) {
                    warn!(error = %e, "Failed to persist position after exit");
                }
                info!(
                    subscription = subscription.id,
                    mint = %position.mint,
                    reason = ?reason,
                    executed = outcome.executed_amount,
                    remaining = position.amount,
                    "Position exit executed"
                );
            }
            Err(e) => {
                warn!(
                    subscription = subscription.id,
                    mint = %position.mint,
                    reason = ?reason,
                    error = %e,
                    "Exit swap failed, position stays open"
                );
            }
        }

        ExitAttempt {
            reason,
            requested_amount: requested,
            result,
        }
    }

    /// Slot for a (subscription, mint) pair, hydrated from the store on
    /// first touch so restarts recover open positions.
    fn slot(&self, subscription_id: u64, mint: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap();
        slots
            .entry((subscription_id, mint.to_string()))
            .or_insert_with(|| {
                let persisted = self
                    .store
                    .load_position(subscription_id, mint)
                    .filter(|p| p.is_open());
                Arc::new(tokio::sync::Mutex::new(persisted))
            })
            .clone()
    }
}
