//! Mirrorbot - Solana Copy-Trade Engine
//!
//! Watches master wallets and replicates their swaps for follower
//! subscriptions via an off-chain venue quoting API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use solana_sdk::commitment_config::CommitmentConfig;
use tracing_subscriber::{fmt, EnvFilter};

use mirrorbot::adapters::cli::{CliApp, Command};
use mirrorbot::adapters::market_data::JupiterPriceClient;
use mirrorbot::adapters::solana::{KeyDirectory, PollerConfig, SignaturePoller, SolanaClient};
use mirrorbot::adapters::venue::{PumpPortalClient, VenueConfig};
use mirrorbot::config::{load_config, Config};
use mirrorbot::domain::{DedupLedger, PositionStatus};
use mirrorbot::engine::classifier::{ClassifierConfig, TransactionClassifier};
use mirrorbot::engine::positions::{PositionConfig, PositionManager};
use mirrorbot::engine::replicator::{Replicator, ReplicatorConfig};
use mirrorbot::engine::store::{StateStore, SubscriptionStore};
use mirrorbot::engine::swap::{SwapClient, SwapConfig};
use mirrorbot::engine::tracking::TrackingRegistry;
use mirrorbot::engine::{CopyTradeEngine, EngineConfig};
use mirrorbot::ports::chain::ChainReader;
use mirrorbot::ports::feed::EventFeed;
use mirrorbot::ports::price::PriceFeed;
use mirrorbot::ports::signer::TransactionSigner;
use mirrorbot::ports::venue::VenueClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    let config_path = match &app.command {
        Command::Run(cmd) => cmd.config.clone(),
        Command::Status(cmd) => cmd.config.clone(),
    };
    let config = load_config(&config_path).context("Failed to load configuration")?;
    init_logging(app.verbose, app.debug, &config.logging.level);

    match app.command {
        Command::Run(_) => run_command(config).await,
        Command::Status(_) => status_command(config).await,
    }
}

/// Flags win over RUST_LOG, which wins over the configured level
fn init_logging(verbose: bool, debug: bool, config_level: &str) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level))
    };

    fmt().with_env_filter(filter).init();
}

fn commitment(config: &Config) -> CommitmentConfig {
    match config.solana.commitment.as_str() {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

async fn run_command(config: Config) -> Result<()> {
    tracing::info!("Starting mirrorbot copy-trade engine...");

    let data_dir = shellexpand::tilde(&config.engine.data_dir).to_string();
    let store = Arc::new(StateStore::open(&data_dir).context("Failed to open state store")?);

    // Dedup survives restarts: reseed from the durable records
    let ledger = Arc::new(DedupLedger::new());
    ledger.seed_processed(store.recorded_signatures());

    let subscriptions = Arc::new(SubscriptionStore::from_subscriptions(
        store
            .load_subscriptions()
            .context("Failed to load subscriptions")?,
    ));

    let solana = SolanaClient::with_commitment(config.solana.get_rpc_url(), commitment(&config));
    let chain: Arc<dyn ChainReader> = Arc::new(solana.clone());

    let keys_path = shellexpand::tilde(&config.wallets.keys_path).to_string();
    let signer: Arc<dyn TransactionSigner> = Arc::new(
        KeyDirectory::from_file(&keys_path)
            .with_context(|| format!("Failed to load follower keys from {}", keys_path))?,
    );

    let venue: Arc<dyn VenueClient> = Arc::new(
        PumpPortalClient::with_config(VenueConfig {
            api_url: config.venue.api_url.clone(),
            timeout: Duration::from_secs(config.venue.timeout_secs),
            max_retries: 3,
        })
        .context("Failed to create venue client")?,
    );

    let price: Arc<dyn PriceFeed> =
        Arc::new(JupiterPriceClient::new().context("Failed to create price client")?);

    let swap = Arc::new(SwapClient::new(
        Arc::clone(&venue),
        Arc::clone(&chain),
        Arc::clone(&signer),
        Arc::clone(&ledger),
        SwapConfig {
            deduction_step: config.engine.deduction_step,
            max_deduction: config.engine.max_deduction,
            retry_pause: Duration::from_millis(config.engine.retry_pause_ms),
            default_slippage: config.engine.default_slippage,
            priority_fee: config.venue.priority_fee,
            pool: config.venue.pool.clone(),
        },
    ));

    let positions = Arc::new(PositionManager::new(
        Arc::clone(&swap),
        Arc::clone(&store),
        PositionConfig {
            dust_threshold: config.engine.dust_threshold,
            exit_slippage: config.engine.default_slippage,
        },
    ));

    let classifier = TransactionClassifier::new(Arc::clone(&chain), ClassifierConfig::default());

    let replicator = Arc::new(Replicator::new(
        Arc::clone(&ledger),
        classifier,
        Arc::clone(&swap),
        Arc::clone(&positions),
        Arc::clone(&price),
        Arc::clone(&signer),
        Arc::clone(&subscriptions),
        Arc::clone(&store),
        ReplicatorConfig {
            venue_default_amount: config.engine.venue_default_amount,
            dust_threshold: config.engine.dust_threshold,
            default_slippage: config.engine.default_slippage,
        },
    ));

    let (poller, event_rx) = SignaturePoller::new(
        PollerConfig {
            poll_interval: Duration::from_secs(config.solana.poll_interval_secs),
            channel_buffer_size: config.engine.event_queue_size,
        },
        solana,
    );
    let poller = Arc::new(poller);
    let feed: Arc<dyn EventFeed> = Arc::clone(&poller) as Arc<dyn EventFeed>;

    let registry = Arc::new(TrackingRegistry::new(feed));

    let engine = Arc::new(CopyTradeEngine::new(
        registry,
        replicator,
        positions,
        subscriptions,
        price,
        event_rx,
        EngineConfig {
            rebuild_interval: Duration::from_secs(config.engine.rebuild_interval_secs),
            price_check_interval: Duration::from_secs(config.engine.price_check_interval_secs),
            dust_threshold: config.engine.dust_threshold,
        },
    ));

    // Feed poller runs alongside the engine loop
    let poll_task = {
        let poller = Arc::clone(&poller);
        tokio::spawn(async move {
            poller.run().await;
        })
    };

    // Setup Ctrl+C handler
    {
        let engine = Arc::clone(&engine);
        let poller = Arc::clone(&poller);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
            poller.shutdown().await;
            engine.stop().await;
        });
    }

    engine.run().await;
    poll_task.abort();
    tracing::info!("Mirrorbot stopped");
    Ok(())
}

async fn status_command(config: Config) -> Result<()> {
    let data_dir = shellexpand::tilde(&config.engine.data_dir).to_string();
    let store = StateStore::open(&data_dir).context("Failed to open state store")?;

    let keys_path = shellexpand::tilde(&config.wallets.keys_path).to_string();
    let keys = KeyDirectory::from_file(&keys_path)
        .with_context(|| format!("Failed to load follower keys from {}", keys_path))?;

    let solana = SolanaClient::with_commitment(config.solana.get_rpc_url(), commitment(&config));

    println!("Followers: {}", keys.wallet_count());
    for wallet in keys.wallets() {
        match solana.native_balance(&wallet).await {
            Ok(balance) => println!("  {}: {:.4} SOL", wallet, balance),
            Err(e) => println!("  {}: balance unavailable ({})", wallet, e),
        }
    }

    let subscriptions = store.load_subscriptions()?;
    println!("Subscriptions: {}", subscriptions.len());
    for sub in &subscriptions {
        println!(
            "  #{} {} -> {} [{:?}/{:?}]",
            sub.id, sub.follower_wallet, sub.master_wallet, sub.status, sub.exit_policy
        );
    }

    let open: Vec<_> = store
        .positions()
        .into_iter()
        .filter(|p| p.status == PositionStatus::Open)
        .collect();
    println!("Open positions: {}", open.len());
    for position in &open {
        println!(
            "  #{} {}: {:.4} @ {:.6}",
            position.subscription_id, position.mint, position.amount, position.entry_price
        );
    }

    println!("Execution records: {}", store.records().len());
    Ok(())
}
