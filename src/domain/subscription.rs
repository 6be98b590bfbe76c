//! Copy-Trade Subscriptions
//!
//! A subscription ties a follower wallet to a master wallet it copies,
//! with a sizing policy, a run status and an exit policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum effective sizing amount (in SOL) below which a subscription is
/// treated as inactive for tracking purposes.
pub const DEFAULT_DUST_THRESHOLD: f64 = 0.001;

/// How the follower's replication amount is derived from a master buy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "value")]
pub enum SizingPolicy {
    /// Always buy with this fixed SOL amount
    FixedAmount(f64),
    /// Buy with this fraction of the master's native spend (0.2 = 20%)
    RatioOfMaster(f64),
    /// Use the venue-configured default amount
    VenueDefault,
}

/// Whether the subscription is currently replicating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Running,
    Paused,
}

/// How open positions created by this subscription are exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Mirror the master's sells proportionally
    Auto,
    /// Exit on take-profit / stop-loss thresholds, ignoring master activity
    Manual,
    /// Replicate buys but never manage the position afterward
    None,
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Invalid sizing amount: {0}")]
    InvalidAmount(f64),
    #[error("Invalid sizing ratio: {0} (must be in (0, 1])")]
    InvalidRatio(f64),
    #[error("Threshold percentages require the manual exit policy")]
    ThresholdWithoutManual,
}

/// A follower's copy-trade configuration for one master wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: u64,
    /// Follower wallet public key (base58)
    pub follower_wallet: String,
    /// Master wallet being copied (base58)
    pub master_wallet: String,
    pub sizing: SizingPolicy,
    pub status: SubscriptionStatus,
    pub exit_policy: ExitPolicy,
    /// Take-profit threshold in percent (e.g. 15.0 = +15%)
    pub take_profit_pct: Option<f64>,
    /// Stop-loss threshold in percent (e.g. 10.0 = -10%)
    pub stop_loss_pct: Option<f64>,
}

impl Subscription {
    pub fn new(
        id: u64,
        follower_wallet: String,
        master_wallet: String,
        sizing: SizingPolicy,
        exit_policy: ExitPolicy,
    ) -> Result<Self, SubscriptionError> {
        match sizing {
            SizingPolicy::FixedAmount(a) if a <= 0.0 => {
                return Err(SubscriptionError::InvalidAmount(a));
            }
            SizingPolicy::RatioOfMaster(r) if r <= 0.0 || r > 1.0 => {
                return Err(SubscriptionError::InvalidRatio(r));
            }
            _ => {}
        }

        Ok(Self {
            id,
            follower_wallet,
            master_wallet,
            sizing,
            status: SubscriptionStatus::Running,
            exit_policy,
            take_profit_pct: None,
            stop_loss_pct: None,
        })
    }

    /// Set TP/SL thresholds (meaningful under the manual exit policy)
    pub fn with_thresholds(
        mut self,
        take_profit_pct: Option<f64>,
        stop_loss_pct: Option<f64>,
    ) -> Self {
        self.take_profit_pct = take_profit_pct;
        self.stop_loss_pct = stop_loss_pct;
        self
    }

    /// Whether this subscription counts toward master-wallet tracking.
    ///
    /// Paused subscriptions and fixed sizings at or below the dust
    /// threshold do not keep a master wallet watched.
    pub fn is_active_for_tracking(&self, dust_threshold: f64) -> bool {
        if self.status != SubscriptionStatus::Running {
            return false;
        }
        match self.sizing {
            SizingPolicy::FixedAmount(a) => a > dust_threshold,
            SizingPolicy::RatioOfMaster(r) => r > 0.0,
            SizingPolicy::VenueDefault => true,
        }
    }

    /// Compute the follower's buy amount for a master buy that spent
    /// `master_native_spent` SOL.
    pub fn replication_amount(&self, master_native_spent: f64, venue_default: f64) -> f64 {
        match self.sizing {
            SizingPolicy::FixedAmount(a) => a,
            SizingPolicy::RatioOfMaster(r) => master_native_spent * r,
            SizingPolicy::VenueDefault => venue_default,
        }
    }

    /// Whether buys under this subscription open managed positions
    pub fn manages_positions(&self) -> bool {
        matches!(self.exit_policy, ExitPolicy::Auto | ExitPolicy::Manual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(sizing: SizingPolicy, exit: ExitPolicy) -> Subscription {
        Subscription::new(1, "follower".into(), "master".into(), sizing, exit).unwrap()
    }

    #[test]
    fn test_new_rejects_nonpositive_amount() {
        let result = Subscription::new(
            1,
            "f".into(),
            "m".into(),
            SizingPolicy::FixedAmount(0.0),
            ExitPolicy::Auto,
        );
        assert!(matches!(result, Err(SubscriptionError::InvalidAmount(_))));
    }

    #[test]
    fn test_new_rejects_out_of_range_ratio() {
        let result = Subscription::new(
            1,
            "f".into(),
            "m".into(),
            SizingPolicy::RatioOfMaster(1.5),
            ExitPolicy::Auto,
        );
        assert!(matches!(result, Err(SubscriptionError::InvalidRatio(_))));
    }

    #[test]
    fn test_dust_threshold_deactivates_tracking() {
        let s = sub(SizingPolicy::FixedAmount(0.001), ExitPolicy::Auto);
        assert!(!s.is_active_for_tracking(DEFAULT_DUST_THRESHOLD));

        let s = sub(SizingPolicy::FixedAmount(0.01), ExitPolicy::Auto);
        assert!(s.is_active_for_tracking(DEFAULT_DUST_THRESHOLD));
    }

    #[test]
    fn test_paused_subscription_not_tracked() {
        let mut s = sub(SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto);
        s.status = SubscriptionStatus::Paused;
        assert!(!s.is_active_for_tracking(DEFAULT_DUST_THRESHOLD));
    }

    #[test]
    fn test_replication_amount_per_policy() {
        let s = sub(SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto);
        assert_eq!(s.replication_amount(5.0, 0.1), 1.0);

        let s = sub(SizingPolicy::RatioOfMaster(0.2), ExitPolicy::Auto);
        assert_eq!(s.replication_amount(5.0, 0.1), 1.0);

        let s = sub(SizingPolicy::VenueDefault, ExitPolicy::Auto);
        assert_eq!(s.replication_amount(5.0, 0.1), 0.1);
    }

    #[test]
    fn test_manages_positions() {
        assert!(sub(SizingPolicy::VenueDefault, ExitPolicy::Auto).manages_positions());
        assert!(sub(SizingPolicy::VenueDefault, ExitPolicy::Manual).manages_positions());
        assert!(!sub(SizingPolicy::VenueDefault, ExitPolicy::None).manages_positions());
    }
}
