//! Venue Swap Client
//!
//! Executes buy/sell swaps through the venue quoting API: build the
//! unsigned transaction, sign it with the follower's key, submit it to
//! the chain. Owns the adaptive-amount retry: venues quote against
//! stale pool state, so shaving the requested amount down converges on
//! an executable size without live liquidity depth.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{DedupLedger, TradeDirection};
use crate::ports::chain::{ChainError, ChainReader};
use crate::ports::signer::{SignerError, TransactionSigner};
use crate::ports::venue::{TradeRequest, VenueClient, VenueError};

/// Factor applied to the on-chain balance when clamping sell amounts
const SELL_BALANCE_FACTOR: f64 = 0.999;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("Execution failed after {attempts} attempts")]
    ExecutionFailed { attempts: u32 },
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: f64, available: f64 },
    #[error("Signing error: {0}")]
    Signing(#[from] SignerError),
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
    #[error("Venue error: {0}")]
    Venue(#[from] VenueError),
}

/// Outcome of a successful swap
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    /// Signature of the submitted follower transaction
    pub signature: String,
    /// Amount actually requested from the venue after clamping/deduction
    pub executed_amount: f64,
}

#[derive(Debug, Clone)]
pub struct SwapConfig {
    /// Per-step deduction applied on venue rejection (0.0005 = 0.05%)
    pub deduction_step: f64,
    /// Cumulative deduction cap (0.005 = 0.5%)
    pub max_deduction: f64,
    /// Pause between retry attempts
    pub retry_pause: Duration,
    /// Default slippage tolerance in percent
    pub default_slippage: f64,
    /// Priority fee attached to every trade, in SOL
    pub priority_fee: f64,
    /// Liquidity pool routed through
    pub pool: String,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            deduction_step: 0.0005,
            max_deduction: 0.005,
            retry_pause: Duration::from_millis(500),
            default_slippage: 10.0,
            priority_fee: 0.00001,
            pool: "pump".to_string(),
        }
    }
}

/// Builds, signs and submits swaps with adaptive-amount retry
pub struct SwapClient {
    venue: Arc<dyn VenueClient>,
    chain: Arc<dyn ChainReader>,
    signer: Arc<dyn TransactionSigner>,
    ledger: Arc<DedupLedger>,
    config: SwapConfig,
}

impl SwapClient {
    pub fn new(
        venue: Arc<dyn VenueClient>,
        chain: Arc<dyn ChainReader>,
        signer: Arc<dyn TransactionSigner>,
        ledger: Arc<DedupLedger>,
        config: SwapConfig,
    ) -> Self {
        Self {
            venue,
            chain,
            signer,
            ledger,
            config,
        }
    }

    /// Execute a swap for `follower`.
    ///
    /// Buys denominate `amount` in SOL; sells denominate it in tokens of
    /// `mint`. Sell amounts are clamped to the follower's real on-chain
    /// balance before submission. With `force_full_exit` the full-amount
    /// attempt is skipped and the deduction ladder is always walked,
    /// since full-balance sells are most prone to dust rejection.
    pub async fn swap(
        &self,
        follower: &str,
        mint: &str,
        amount: f64,
        slippage: f64,
        direction: TradeDirection,
        force_full_exit: bool,
    ) -> Result<SwapOutcome, SwapError> {
        let amount = match direction {
            TradeDirection::Buy => amount,
            TradeDirection::Sell => self.clamp_sell_amount(follower, mint, amount).await?,
        };

        let max_steps = (self.config.max_deduction / self.config.deduction_step).round() as u32;
        let first_step = if force_full_exit { 1 } else { 0 };
        let mut attempts = 0;

        for step in first_step..=max_steps {
            let adjusted = amount * (1.0 - step as f64 * self.config.deduction_step);
            attempts += 1;

            match self
                .attempt(follower, mint, adjusted, slippage, direction)
                .await
            {
                Ok(signature) => {
                    info!(
                        follower = %follower,
                        mint = %mint,
                        amount = adjusted,
                        attempts,
                        signature = %signature,
                        "Swap executed"
                    );
                    return Ok(SwapOutcome {
                        signature,
                        executed_amount: adjusted,
                    });
                }
                // Missing or bad key material cannot improve with a
                // smaller amount
                Err(SwapError::Signing(e)) => return Err(SwapError::Signing(e)),
                Err(e) => {
                    debug!(
                        follower = %follower,
                        mint = %mint,
                        amount = adjusted,
                        attempt = attempts,
                        error = %e,
                        "Swap attempt failed"
                    );
                    if step < max_steps {
                        tokio::time::sleep(self.config.retry_pause).await;
                    }
                }
            }
        }

        warn!(
            follower = %follower,
            mint = %mint,
            amount,
            attempts,
            "Swap failed at every deduction step"
        );
        Err(SwapError::ExecutionFailed { attempts })
    }

    /// One build-sign-submit attempt
    async fn attempt(
        &self,
        follower: &str,
        mint: &str,
        amount: f64,
        slippage: f64,
        direction: TradeDirection,
    ) -> Result<String, SwapError> {
        let request = match direction {
            TradeDirection::Buy => {
                TradeRequest::buy(follower.to_string(), mint.to_string(), amount, slippage)
            }
            TradeDirection::Sell => {
                TradeRequest::sell(follower.to_string(), mint.to_string(), amount, slippage)
            }
        }
        .with_priority_fee(self.config.priority_fee)
        .with_pool(self.config.pool.clone());

        let unsigned = self.venue.build_swap_transaction(&request).await?;
        let signed = self.signer.sign(follower, &unsigned).await?;
        let signature = self.chain.submit_transaction(&signed).await?;

        // Never copy our own trades back
        self.ledger.exclude(&signature);

        Ok(signature)
    }

    /// Re-read the on-chain balance and clamp the requested sell amount,
    /// protecting against stale internal bookkeeping.
    async fn clamp_sell_amount(
        &self,
        follower: &str,
        mint: &str,
        requested: f64,
    ) -> Result<f64, SwapError> {
        let balance = self.chain.token_balance(follower, mint).await?;
        if balance <= 0.0 {
            return Err(SwapError::InsufficientBalance {
                requested,
                available: balance,
            });
        }

        let ceiling = balance * SELL_BALANCE_FACTOR;
        if requested > ceiling {
            debug!(
                follower = %follower,
                mint = %mint,
                requested,
                clamped = ceiling,
                "Clamping sell amount to on-chain balance"
            );
            Ok(ceiling)
        } else {
            Ok(requested)
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }
}
