//! Solana RPC adapter
//!
//! Wraps the synchronous RPC client with async-compatible methods and
//! implements [`ChainReader`]. Balance deltas come from parsed
//! transactions: native SOL from the lamport pre/post arrays, token
//! balances from the pre/post token balance lists filtered by owner.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::rpc_client::{GetConfirmedSignaturesForAddress2Config, RpcClient};
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedTransaction, UiMessage, UiTransactionEncoding, UiTransactionTokenBalance,
};
use tracing::warn;

use crate::ports::chain::{AssetDelta, ChainError, ChainReader, NATIVE_MINT};

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Signatures fetched per wallet per poll
pub const SIGNATURE_FETCH_LIMIT: usize = 5;

/// Retry attempts for rate-limited RPC calls
const MAX_RPC_RETRIES: u32 = 3;

/// Async wrapper around the Solana RPC client
#[derive(Clone)]
pub struct SolanaClient {
    client: Arc<RpcClient>,
}

impl SolanaClient {
    pub fn new(rpc_url: String) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            rpc_url,
            CommitmentConfig::confirmed(),
        ));
        Self { client }
    }

    pub fn with_commitment(rpc_url: String, commitment: CommitmentConfig) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(rpc_url, commitment));
        Self { client }
    }

    /// Execute an RPC call with bounded backoff on rate limiting
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, ChainError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, ChainError>>,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RPC_RETRIES {
            match op().await {
                Ok(value) => return Ok(value),
                Err(ChainError::RateLimited) => {
                    let backoff = Duration::from_secs(2u64.pow(attempt + 1)); // 2s, 4s, 8s
                    warn!(
                        "RPC rate limited, backing off for {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RPC_RETRIES
                    );
                    last_error = Some(ChainError::RateLimited);
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ChainError::RateLimited))
    }

    /// Native SOL balance of a wallet, in SOL
    pub async fn native_balance(&self, wallet: &str) -> Result<f64, ChainError> {
        let pubkey = parse_pubkey(wallet)?;

        self.with_retry(|| {
            let client = Arc::clone(&self.client);
            async move {
                tokio::task::spawn_blocking(move || {
                    client
                        .get_balance(&pubkey)
                        .map(|lamports| lamports as f64 / LAMPORTS_PER_SOL)
                        .map_err(map_rpc_error)
                })
                .await
                .map_err(|e| ChainError::Rpc(format!("Task join error: {}", e)))?
            }
        })
        .await
    }

    /// Recent transaction signatures for a wallet, newest first
    pub async fn recent_signatures(&self, wallet: &str) -> Result<Vec<String>, ChainError> {
        let pubkey = parse_pubkey(wallet)?;

        self.with_retry(|| {
            let client = Arc::clone(&self.client);
            async move {
                tokio::task::spawn_blocking(move || {
                    let config = GetConfirmedSignaturesForAddress2Config {
                        before: None,
                        until: None,
                        limit: Some(SIGNATURE_FETCH_LIMIT),
                        commitment: Some(CommitmentConfig::confirmed()),
                    };
                    client
                        .get_signatures_for_address_with_config(&pubkey, config)
                        .map(|sigs| sigs.into_iter().map(|s| s.signature).collect())
                        .map_err(map_rpc_error)
                })
                .await
                .map_err(|e| ChainError::Rpc(format!("Task join error: {}", e)))?
            }
        })
        .await
    }
}

#[async_trait]
impl ChainReader for SolanaClient {
    async fn transaction_deltas(
        &self,
        wallet: &str,
        signature: &str,
    ) -> Result<Vec<AssetDelta>, ChainError> {
        let sig = Signature::from_str(signature)
            .map_err(|e| ChainError::Rpc(format!("Invalid signature {}: {}", signature, e)))?;
        let wallet = wallet.to_string();
        let signature = signature.to_string();

        self.with_retry(|| {
            let client = Arc::clone(&self.client);
            let wallet = wallet.clone();
            let signature = signature.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    let config = RpcTransactionConfig {
                        encoding: Some(UiTransactionEncoding::JsonParsed),
                        commitment: Some(CommitmentConfig::confirmed()),
                        max_supported_transaction_version: Some(0),
                    };
                    let tx = client
                        .get_transaction_with_config(&sig, config)
                        .map_err(|e| {
                            let msg = e.to_string();
                            if msg.contains("429") {
                                ChainError::RateLimited
                            } else {
                                ChainError::TransactionNotFound(signature.clone())
                            }
                        })?;

                    extract_deltas(&wallet, &tx.transaction)
                })
                .await
                .map_err(|e| ChainError::Rpc(format!("Task join error: {}", e)))?
            }
        })
        .await
    }

    async fn token_balance(&self, owner: &str, mint: &str) -> Result<f64, ChainError> {
        let owner_pk = parse_pubkey(owner)?;
        let mint_pk = parse_pubkey(mint)?;

        self.with_retry(|| {
            let client = Arc::clone(&self.client);
            async move {
                tokio::task::spawn_blocking(move || {
                    let accounts = client
                        .get_token_accounts_by_owner(
                            &owner_pk,
                            TokenAccountsFilter::Mint(mint_pk),
                        )
                        .map_err(map_rpc_error)?;

                    let Some(account) = accounts.first() else {
                        return Ok(0.0);
                    };

                    let account_pk = Pubkey::from_str(&account.pubkey)
                        .map_err(|e| ChainError::InvalidPubkey(e.to_string()))?;

                    let balance = client
                        .get_token_account_balance(&account_pk)
                        .map_err(map_rpc_error)?;

                    Ok(balance.ui_amount.unwrap_or(0.0))
                })
                .await
                .map_err(|e| ChainError::Rpc(format!("Task join error: {}", e)))?
            }
        })
        .await
    }

    async fn submit_transaction(&self, signed_tx: &[u8]) -> Result<String, ChainError> {
        let tx: VersionedTransaction = bincode::deserialize(signed_tx)
            .map_err(|e| ChainError::Submission(format!("Malformed transaction: {}", e)))?;

        self.with_retry(|| {
            let client = Arc::clone(&self.client);
            let tx = tx.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    client
                        .send_transaction(&tx)
                        .map(|sig| sig.to_string())
                        .map_err(|e| {
                            let msg = e.to_string();
                            if msg.contains("429") {
                                ChainError::RateLimited
                            } else {
                                ChainError::Submission(msg)
                            }
                        })
                })
                .await
                .map_err(|e| ChainError::Rpc(format!("Task join error: {}", e)))?
            }
        })
        .await
    }
}

fn parse_pubkey(s: &str) -> Result<Pubkey, ChainError> {
    Pubkey::from_str(s).map_err(|e| ChainError::InvalidPubkey(format!("{}: {}", s, e)))
}

fn map_rpc_error(e: solana_client::client_error::ClientError) -> ChainError {
    let msg = e.to_string();
    if msg.contains("429") {
        ChainError::RateLimited
    } else {
        ChainError::Rpc(msg)
    }
}

/// Compute per-asset balance deltas for one wallet from a parsed transaction
fn extract_deltas(
    wallet: &str,
    tx: &solana_transaction_status::EncodedTransactionWithStatusMeta,
) -> Result<Vec<AssetDelta>, ChainError> {
    let meta = tx
        .meta
        .as_ref()
        .ok_or_else(|| ChainError::Rpc("Transaction has no meta".into()))?;

    let account_keys: Vec<String> = match &tx.transaction {
        EncodedTransaction::Json(ui_tx) => match &ui_tx.message {
            UiMessage::Parsed(msg) => msg.account_keys.iter().map(|k| k.pubkey.clone()).collect(),
            UiMessage::Raw(msg) => msg.account_keys.clone(),
        },
        _ => return Err(ChainError::Rpc("Unexpected transaction encoding".into())),
    };

    let mut deltas = Vec::new();

    // Native SOL from the lamport arrays
    if let Some(index) = account_keys.iter().position(|k| k == wallet) {
        let pre = meta.pre_balances.get(index).copied().unwrap_or(0) as f64 / LAMPORTS_PER_SOL;
        let post = meta.post_balances.get(index).copied().unwrap_or(0) as f64 / LAMPORTS_PER_SOL;
        deltas.push(AssetDelta {
            mint: NATIVE_MINT.to_string(),
            delta: post - pre,
            pre_amount: pre,
        });
    }

    let pre_token = token_balances(&meta.pre_token_balances, wallet);
    let post_token = token_balances(&meta.post_token_balances, wallet);

    let mut mints: Vec<String> = pre_token.iter().chain(post_token.iter()).map(|(m, _)| m.clone()).collect();
    mints.sort();
    mints.dedup();

    for mint in mints {
        let pre = lookup(&pre_token, &mint);
        let post = lookup(&post_token, &mint);
        if (post - pre).abs() > f64::EPSILON {
            deltas.push(AssetDelta {
                mint,
                delta: post - pre,
                pre_amount: pre,
            });
        }
    }

    Ok(deltas)
}

fn token_balances(
    balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>,
    wallet: &str,
) -> Vec<(String, f64)> {
    let list = match balances {
        OptionSerializer::Some(list) => list,
        _ => return Vec::new(),
    };

    list.iter()
        .filter(|b| matches!(&b.owner, OptionSerializer::Some(owner) if owner == wallet))
        .map(|b| (b.mint.clone(), b.ui_token_amount.ui_amount.unwrap_or(0.0)))
        .collect()
}

fn lookup(balances: &[(String, f64)], mint: &str) -> f64 {
    balances
        .iter()
        .find(|(m, _)| m == mint)
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}
