//! Execution Records
//!
//! One record per detected master transaction per subscription attempted.
//! Records are the audit trail and, together with (subscription, master
//! signature), the idempotency key for replication. Immutable once terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a classified master swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Succeeded,
    Failed,
}

/// Audit row for one replication attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub subscription_id: u64,
    /// Master transaction signature that triggered this attempt
    pub master_signature: String,
    /// Token mint involved
    pub mint: String,
    pub direction: TradeDirection,
    pub status: ExecutionStatus,
    /// Realized price, when known
    pub price: Option<f64>,
    /// Realized amount (SOL for buys, tokens for sells)
    pub amount: Option<f64>,
    /// Signature of the follower's own transaction, on success
    pub follower_signature: Option<String>,
    /// Terminal error description, on failure
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn pending(
        subscription_id: u64,
        master_signature: String,
        mint: String,
        direction: TradeDirection,
    ) -> Self {
        Self {
            subscription_id,
            master_signature,
            mint,
            direction,
            status: ExecutionStatus::Pending,
            price: None,
            amount: None,
            follower_signature: None,
            error: None,
            executed_at: Utc::now(),
        }
    }

    /// Mark the attempt as succeeded with the realized fill. The price
    /// may be unknown when the price feed is unavailable at fill time.
    pub fn succeeded(
        mut self,
        price: Option<f64>,
        amount: f64,
        follower_signature: String,
    ) -> Self {
        self.status = ExecutionStatus::Succeeded;
        self.price = price;
        self.amount = Some(amount);
        self.follower_signature = Some(follower_signature);
        self.executed_at = Utc::now();
        self
    }

    /// Mark the attempt as failed with the terminal error
    pub fn failed(mut self, error: String) -> Self {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error);
        self.executed_at = Utc::now();
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Succeeded | ExecutionStatus::Failed
        )
    }

    /// Idempotency key: one record per (subscription, master signature)
    pub fn key(&self) -> (u64, &str) {
        (self.subscription_id, self.master_signature.as_str())
    }
}
