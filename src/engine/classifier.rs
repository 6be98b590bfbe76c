//! Transaction Classifier
//!
//! Resolves a master wallet's transaction into a classified swap by
//! inspecting balance deltas: the asset that decreased is the input, the
//! one that increased is the output. Direction is Buy when the input is
//! native SOL, Sell otherwise. Anything that is not exactly one
//! input/output pair (multi-hop swaps, transfers) is ambiguous and
//! dropped, never replicated.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::domain::TradeDirection;
use crate::ports::chain::{AssetDelta, ChainError, ChainReader};

/// Native deltas smaller than this are treated as fee noise, not a leg
/// of the swap.
const NATIVE_NOISE_FLOOR: f64 = 0.001;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Transaction not found after retries: {0}")]
    TransactionNotFound(String),
    #[error("Ambiguous transaction {signature}: {reason}")]
    Ambiguous { signature: String, reason: String },
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

/// A master swap resolved from balance deltas
#[derive(Debug, Clone)]
pub struct ClassifiedSwap {
    pub signature: String,
    pub master_wallet: String,
    pub direction: TradeDirection,
    pub input_mint: String,
    pub output_mint: String,
    /// SOL the master spent, for ratio sizing (buys)
    pub master_native_spent: f64,
    /// Fraction of the master's pre-transaction holding that was sold
    pub master_sold_fraction: f64,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Lookup attempts before giving up on a signature
    pub lookup_retries: u32,
    /// Delay between lookup attempts
    pub retry_delay: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            lookup_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

pub struct TransactionClassifier {
    chain: Arc<dyn ChainReader>,
    config: ClassifierConfig,
}

impl TransactionClassifier {
    pub fn new(chain: Arc<dyn ChainReader>, config: ClassifierConfig) -> Self {
        Self { chain, config }
    }

    /// Classify a master transaction as a buy or sell swap
    pub async fn classify(
        &self,
        wallet: &str,
        signature: &str,
    ) -> Result<ClassifiedSwap, ClassifyError> {
        let deltas = self.fetch_deltas(wallet, signature).await?;
        classify_deltas(wallet, signature, &deltas)
    }

    /// Fetch deltas, retrying not-found lookups. Freshly confirmed
    /// transactions are often not yet visible to the RPC node.
    async fn fetch_deltas(
        &self,
        wallet: &str,
        signature: &str,
    ) -> Result<Vec<AssetDelta>, ClassifyError> {
        let mut attempt = 0;
        loop {
            match self.chain.transaction_deltas(wallet, signature).await {
                Ok(deltas) => return Ok(deltas),
                Err(ChainError::TransactionNotFound(_)) => {
                    attempt += 1;
                    if attempt >= self.config.lookup_retries {
                        return Err(ClassifyError::TransactionNotFound(signature.to_string()));
                    }
                    debug!(
                        signature = %signature,
                        attempt,
                        "Transaction not yet visible, retrying lookup"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(ClassifyError::Chain(e)),
            }
        }
    }
}

/// Pure classification over a delta set
fn classify_deltas(
    wallet: &str,
    signature: &str,
    deltas: &[AssetDelta],
) -> Result<ClassifiedSwap, ClassifyError> {
    let significant: Vec<&AssetDelta> = deltas
        .iter()
        .filter(|d| {
            if d.is_native() {
                d.delta.abs() >= NATIVE_NOISE_FLOOR
            } else {
                d.delta.abs() > 0.0
            }
        })
        .collect();

    let decreased: Vec<&AssetDelta> = significant.iter().filter(|d| d.delta < 0.0).copied().collect();
    let increased: Vec<&AssetDelta> = significant.iter().filter(|d| d.delta > 0.0).copied().collect();

    if decreased.len() != 1 || increased.len() != 1 {
        return Err(ClassifyError::Ambiguous {
            signature: signature.to_string(),
            reason: format!(
                "{} decreased / {} increased assets",
                decreased.len(),
                increased.len()
            ),
        });
    }

    let input = decreased[0];
    let output = increased[0];

    let direction = if input.is_native() {
        TradeDirection::Buy
    } else {
        TradeDirection::Sell
    };

    let master_sold_fraction = if direction == TradeDirection::Sell {
        if input.pre_amount <= 0.0 {
            return Err(ClassifyError::Ambiguous {
                signature: signature.to_string(),
                reason: "sell with no pre-transaction balance".to_string(),
            });
        }
        (-input.delta / input.pre_amount).min(1.0)
    } else {
        0.0
    };

    Ok(ClassifiedSwap {
        signature: signature.to_string(),
        master_wallet: wallet.to_string(),
        direction,
        input_mint: input.mint.clone(),
        output_mint: output.mint.clone(),
        master_native_spent: if direction == TradeDirection::Buy {
            -input.delta
        } else {
            0.0
        },
        master_sold_fraction,
    })
}
