//! Follower Positions
//!
//! One position exists per (subscription, token mint) while a replicated
//! buy is being managed. The lifecycle is `open -> closed`; a closed
//! position is terminal and never reopened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Position is already closed")]
    AlreadyClosed,
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Exit amount {requested} exceeds position amount {held}")]
    ExitExceedsHolding { requested: f64, held: f64 },
}

/// A follower's replicated stake in a token, tracked until exit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub subscription_id: u64,
    /// Token mint address
    pub mint: String,
    /// Weighted-average entry price
    pub entry_price: f64,
    /// Remaining token amount (UI units)
    pub amount: f64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn open(
        subscription_id: u64,
        mint: String,
        entry_price: f64,
        amount: f64,
    ) -> Result<Self, PositionError> {
        if amount <= 0.0 {
            return Err(PositionError::InvalidAmount(amount));
        }
        if entry_price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }

        Ok(Self {
            subscription_id,
            mint,
            entry_price,
            amount,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Merge a further buy into this open position.
    ///
    /// Entry price becomes the amount-weighted average of the existing
    /// entry and the new fill.
    pub fn merge_buy(&mut self, price: f64, amount: f64) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::AlreadyClosed);
        }
        if amount <= 0.0 {
            return Err(PositionError::InvalidAmount(amount));
        }
        if price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(price));
        }

        let total = self.amount + amount;
        self.entry_price = (self.entry_price * self.amount + price * amount) / total;
        self.amount = total;
        Ok(())
    }

    /// Reduce the position by an executed exit amount. Closes the position
    /// when nothing remains.
    pub fn apply_exit(&mut self, executed_amount: f64) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::AlreadyClosed);
        }
        if executed_amount <= 0.0 {
            return Err(PositionError::InvalidAmount(executed_amount));
        }
        if executed_amount > self.amount {
            return Err(PositionError::ExitExceedsHolding {
                requested: executed_amount,
                held: self.amount,
            });
        }

        self.amount -= executed_amount;
        if self.amount <= 0.0 {
            self.close()?;
        }
        Ok(())
    }

    /// Close the position outright (full exit)
    pub fn close(&mut self) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::AlreadyClosed);
        }
        self.status = PositionStatus::Closed;
        self.amount = 0.0;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Percent change of `current_price` relative to the entry price
    pub fn pnl_pct(&self, current_price: f64) -> f64 {
        if self.entry_price == 0.0 {
            return 0.0;
        }
        (current_price - self.entry_price) / self.entry_price * 100.0
    }

    /// Whether TP or SL is breached at `current_price`. Returns the exit
    /// reason, if any.
    pub fn threshold_breach(
        &self,
        current_price: f64,
        take_profit_pct: Option<f64>,
        stop_loss_pct: Option<f64>,
    ) -> Option<ExitReason> {
        let pnl = self.pnl_pct(current_price);
        if let Some(tp) = take_profit_pct {
            if pnl >= tp {
                return Some(ExitReason::TakeProfit);
            }
        }
        if let Some(sl) = stop_loss_pct {
            if pnl <= -sl {
                return Some(ExitReason::StopLoss);
            }
        }
        None
    }
}

/// Why a position exit was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Master sold; mirroring proportionally
    MasterSell,
    TakeProfit,
    StopLoss,
}
