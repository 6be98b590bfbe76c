//! Copy-Trade Engine Integration Tests
//!
//! End-to-end pipeline tests over mock ports: a wallet event flows
//! through dedup gating, classification, fan-out replication and
//! position management. All tests are deterministic (no real network
//! calls).

use std::sync::Arc;
use std::time::Duration;

use mirrorbot::domain::{
    DedupLedger, ExecutionStatus, ExitPolicy, SizingPolicy, Subscription, TradeDirection,
};
use mirrorbot::engine::classifier::{ClassifierConfig, TransactionClassifier};
use mirrorbot::engine::positions::{PositionConfig, PositionManager};
use mirrorbot::engine::replicator::{Replicator, ReplicatorConfig};
use mirrorbot::engine::store::{StateStore, SubscriptionStore};
use mirrorbot::engine::swap::{SwapClient, SwapConfig};
use mirrorbot::engine::tracking::TrackingRegistry;
use mirrorbot::ports::chain::{AssetDelta, NATIVE_MINT};
use mirrorbot::ports::feed::WalletEvent;
use mirrorbot::ports::mocks::{MockChain, MockFeed, MockPriceFeed, MockSigner, MockVenue};

const MASTER: &str = "MasterWallet1111111111111111111111111111111";
const TOKEN: &str = "TokenMintAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

struct Pipeline {
    venue: Arc<MockVenue>,
    chain: Arc<MockChain>,
    price: Arc<MockPriceFeed>,
    ledger: Arc<DedupLedger>,
    store: Arc<StateStore>,
    subscriptions: Arc<SubscriptionStore>,
    positions: Arc<PositionManager>,
    replicator: Arc<Replicator>,
    _dir: tempfile::TempDir,
}

fn pipeline(subs: Vec<Subscription>) -> Pipeline {
    let venue = Arc::new(MockVenue::new());
    let chain = Arc::new(MockChain::new());
    let price = Arc::new(MockPriceFeed::new());
    let ledger = Arc::new(DedupLedger::new());

    let signer = Arc::new({
        let s = MockSigner::new();
        for sub in &subs {
            s.add_wallet(&sub.follower_wallet);
        }
        s
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::open(dir.path()).unwrap());
    let subscriptions = Arc::new(SubscriptionStore::from_subscriptions(subs));

    let swap = Arc::new(SwapClient::new(
        venue.clone(),
        chain.clone(),
        signer.clone(),
        ledger.clone(),
        SwapConfig {
            retry_pause: Duration::from_millis(1),
            ..SwapConfig::default()
        },
    ));

    let positions = Arc::new(PositionManager::new(
        swap.clone(),
        store.clone(),
        PositionConfig::default(),
    ));

    let classifier = TransactionClassifier::new(
        chain.clone(),
        ClassifierConfig {
            lookup_retries: 2,
            retry_delay: Duration::from_millis(1),
        },
    );

    let replicator = Arc::new(Replicator::new(
        ledger.clone(),
        classifier,
        swap,
        positions.clone(),
        price.clone(),
        signer,
        subscriptions.clone(),
        store.clone(),
        ReplicatorConfig::default(),
    ));

    Pipeline {
        venue,
        chain,
        price,
        ledger,
        store,
        subscriptions,
        positions,
        replicator,
        _dir: dir,
    }
}

fn sub(id: u64, sizing: SizingPolicy, exit: ExitPolicy) -> Subscription {
    Subscription::new(
        id,
        format!("Follower{}", id),
        MASTER.to_string(),
        sizing,
        exit,
    )
    .unwrap()
}

fn master_buy(chain: &MockChain, signature: &str, sol_spent: f64) {
    chain.set_deltas(
        signature,
        vec![
            AssetDelta {
                mint: NATIVE_MINT.to_string(),
                delta: -sol_spent,
                pre_amount: 100.0,
            },
            AssetDelta {
                mint: TOKEN.to_string(),
                delta: 50_000.0,
                pre_amount: 0.0,
            },
        ],
    );
}

fn master_sell(chain: &MockChain, signature: &str, sold: f64, pre: f64) {
    chain.set_deltas(
        signature,
        vec![
            AssetDelta {
                mint: TOKEN.to_string(),
                delta: -sold,
                pre_amount: pre,
            },
            AssetDelta {
                mint: NATIVE_MINT.to_string(),
                delta: 2.0,
                pre_amount: 100.0,
            },
        ],
    );
}

fn event(signature: &str) -> WalletEvent {
    WalletEvent {
        wallet: MASTER.to_string(),
        signature: signature.to_string(),
    }
}

// Two active auto subscriptions with ratio and fixed sizing replicate
// one master buy into two records and two positions sized per policy
#[tokio::test]
async fn test_master_buy_fans_out_per_sizing_policy() {
    let p = pipeline(vec![
        sub(1, SizingPolicy::RatioOfMaster(0.2), ExitPolicy::Auto),
        sub(2, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto),
    ]);
    master_buy(&p.chain, "buy_sig", 10.0);
    p.price.set_price(TOKEN, 0.001);

    p.replicator.clone().handle_event(event("buy_sig")).await;

    let records = p.store.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.status, ExecutionStatus::Succeeded);
        assert_eq!(record.direction, TradeDirection::Buy);
        assert!(record.follower_signature.is_some());
    }

    // Ratio 20% of 10 SOL = 2 SOL -> 2000 tokens; fixed 1 SOL -> 1000
    let mut open = p.positions.open_positions().await;
    open.sort_by_key(|p| p.subscription_id);
    assert_eq!(open.len(), 2);
    assert!((open[0].amount - 2000.0).abs() < 1e-6);
    assert!((open[1].amount - 1000.0).abs() < 1e-6);
}

// Same transaction hash delivered twice yields exactly one record
#[tokio::test]
async fn test_duplicate_delivery_replicates_once() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "dup_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);

    p.replicator.clone().handle_event(event("dup_sig")).await;
    p.replicator.clone().handle_event(event("dup_sig")).await;

    assert_eq!(p.store.records().len(), 1);
}

// Concurrent duplicate deliveries: mark-before-replicate means at most
// one wins
#[tokio::test]
async fn test_concurrent_duplicate_delivery() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "race_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);

    let a = p.replicator.clone().handle_event(event("race_sig"));
    let b = p.replicator.clone().handle_event(event("race_sig"));
    tokio::join!(a, b);

    assert_eq!(p.store.records().len(), 1);
}

// An excluded hash is never replicated, regardless of delivery count
#[tokio::test]
async fn test_excluded_transaction_never_replicated() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "own_sig", 5.0);
    p.ledger.exclude("own_sig");

    p.replicator.clone().handle_event(event("own_sig")).await;
    p.replicator.clone().handle_event(event("own_sig")).await;

    assert!(p.store.records().is_empty());
    assert!(p.venue.requests().is_empty());
}

// The engine's own submitted transactions are excluded, so a feedback
// event for a follower trade is dropped
#[tokio::test]
async fn test_own_trades_are_not_copied_back() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);

    p.replicator.clone().handle_event(event("buy_sig")).await;
    let follower_sig = p.store.records()[0]
        .follower_signature
        .clone()
        .unwrap();

    assert!(p.ledger.is_excluded(&follower_sig));
    p.replicator
        .clone()
        .handle_event(event(&follower_sig))
        .await;
    assert_eq!(p.store.records().len(), 1);
}

// Auto subscriptions mirror the master's sold fraction
#[tokio::test]
async fn test_master_sell_mirrored_proportionally() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;

    // Follower holds 1000 tokens; master sells 40% of its stack
    p.chain.set_balance("Follower1", TOKEN, 1000.0);
    master_sell(&p.chain, "sell_sig", 20_000.0, 50_000.0);
    p.replicator.clone().handle_event(event("sell_sig")).await;

    let records = p.store.records();
    assert_eq!(records.len(), 2);
    let sell = records
        .iter()
        .find(|r| r.direction == TradeDirection::Sell)
        .unwrap();
    assert_eq!(sell.status, ExecutionStatus::Succeeded);

    let open = p.positions.open_positions().await;
    assert_eq!(open.len(), 1);
    assert!((open[0].amount - 600.0).abs() < 1.0);
}

// A full master exit closes the follower position
#[tokio::test]
async fn test_master_full_exit_closes_position() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;

    p.chain.set_balance("Follower1", TOKEN, 1000.0);
    master_sell(&p.chain, "sell_sig", 50_000.0, 50_000.0);
    p.replicator.clone().handle_event(event("sell_sig")).await;

    assert!(p.positions.open_positions().await.is_empty());
}

// A forced full exit failing at every deduction step returns a failed
// record and leaves the position open (Scenario D)
#[tokio::test]
async fn test_failed_full_exit_keeps_position_open() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;

    p.chain.set_balance("Follower1", TOKEN, 1000.0);
    p.venue.set_always_reject(true);
    let attempts_before = p.venue.requests().len();

    master_sell(&p.chain, "sell_sig", 50_000.0, 50_000.0);
    p.replicator.clone().handle_event(event("sell_sig")).await;

    let sell = p
        .store
        .records()
        .into_iter()
        .find(|r| r.direction == TradeDirection::Sell)
        .unwrap();
    assert_eq!(sell.status, ExecutionStatus::Failed);

    // Full deduction ladder walked: exactly 10 attempts
    assert_eq!(p.venue.requests().len() - attempts_before, 10);

    let open = p.positions.open_positions().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].amount, 1000.0);
}

// Subscriptions with exit policy none replicate buys but never open
// positions or mirror sells
#[tokio::test]
async fn test_none_policy_never_manages_positions() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::None)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;

    assert_eq!(p.store.records().len(), 1);
    assert!(p.positions.open_positions().await.is_empty());

    master_sell(&p.chain, "sell_sig", 50_000.0, 50_000.0);
    p.replicator.clone().handle_event(event("sell_sig")).await;
    assert_eq!(p.store.records().len(), 1);
}

// Manual-policy threshold exit triggers only once the configured
// percentage is breached (Scenario B)
#[tokio::test]
async fn test_threshold_exit_breach_boundary() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Manual)]);
    let subscription = p.subscriptions.all().pop().unwrap().with_thresholds(Some(15.0), None);
    p.subscriptions.upsert(subscription.clone());

    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 10.0);
    p.replicator.clone().handle_event(event("buy_sig")).await;
    p.chain.set_balance("Follower1", TOKEN, 0.1);

    // +12% with TP at 15%: no exit
    assert!(p
        .positions
        .evaluate_price(&subscription, TOKEN, 11.2)
        .await
        .is_none());
    assert_eq!(p.positions.open_positions().await.len(), 1);

    // +20%: exit exactly once
    assert!(p
        .positions
        .evaluate_price(&subscription, TOKEN, 12.0)
        .await
        .is_some());
    assert!(p.positions.open_positions().await.is_empty());
    assert!(p
        .positions
        .evaluate_price(&subscription, TOKEN, 12.0)
        .await
        .is_none());
}

// Ambiguous (multi-hop) transactions are dropped, never replicated
#[tokio::test]
async fn test_ambiguous_transaction_dropped() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    p.chain.set_deltas(
        "multi_hop",
        vec![
            AssetDelta {
                mint: NATIVE_MINT.to_string(),
                delta: -1.0,
                pre_amount: 10.0,
            },
            AssetDelta {
                mint: TOKEN.to_string(),
                delta: 100.0,
                pre_amount: 0.0,
            },
            AssetDelta {
                mint: "OtherMint".to_string(),
                delta: 50.0,
                pre_amount: 0.0,
            },
        ],
    );

    p.replicator.clone().handle_event(event("multi_hop")).await;
    assert!(p.store.records().is_empty());
}

// A follower with no key material is skipped with a failed record while
// other followers replicate normally
#[tokio::test]
async fn test_missing_key_isolated_per_subscription() {
    let mut s2 = sub(2, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto);
    s2.follower_wallet = "UnknownFollower".to_string();
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    p.subscriptions.upsert(s2);

    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;

    let records = p.store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Succeeded)
            .count(),
        1
    );
    assert_eq!(
        records
            .iter()
            .filter(|r| r.status == ExecutionStatus::Failed)
            .count(),
        1
    );
}

// A ratio sizing that computes a dust-sized amount skips the venue but
// still leaves an audit record
#[tokio::test]
async fn test_dust_sized_buy_recorded_not_executed() {
    let p = pipeline(vec![sub(1, SizingPolicy::RatioOfMaster(0.0001), ExitPolicy::Auto)]);
    // 0.01% of 5 SOL = 0.0005, below the 0.001 dust threshold
    master_buy(&p.chain, "small_buy", 5.0);

    p.replicator.clone().handle_event(event("small_buy")).await;

    assert!(p.venue.requests().is_empty());
    let records = p.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExecutionStatus::Failed);
    assert!(records[0].error.as_deref().unwrap().contains("dust threshold"));
    assert!(p.positions.open_positions().await.is_empty());
}

// A TP breach during a price sweep leaves an audit record even when the
// venue rejects every attempt
#[tokio::test]
async fn test_threshold_exit_failure_recorded() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Manual)]);
    let subscription = p.subscriptions.all().pop().unwrap().with_thresholds(Some(15.0), None);
    p.subscriptions.upsert(subscription.clone());

    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 10.0);
    p.replicator.clone().handle_event(event("buy_sig")).await;
    p.chain.set_balance("Follower1", TOKEN, 0.1);

    p.venue.set_always_reject(true);
    let attempt = p
        .positions
        .evaluate_price(&subscription, TOKEN, 12.0)
        .await
        .unwrap();
    assert!(attempt.result.is_err());

    let sell = p
        .store
        .records()
        .into_iter()
        .find(|r| r.direction == TradeDirection::Sell)
        .unwrap();
    assert_eq!(sell.status, ExecutionStatus::Failed);
    assert_eq!(p.positions.open_positions().await.len(), 1);
}

// Restart: reseeding the ledger from the durable records prevents
// re-replication
#[tokio::test]
async fn test_restart_does_not_re_replicate() {
    let p = pipeline(vec![sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto)]);
    master_buy(&p.chain, "buy_sig", 5.0);
    p.price.set_price(TOKEN, 0.001);
    p.replicator.clone().handle_event(event("buy_sig")).await;
    assert_eq!(p.store.records().len(), 1);

    // Fresh ledger, as after a restart, seeded from the store
    let fresh = DedupLedger::new();
    fresh.seed_processed(p.store.recorded_signatures());
    assert!(fresh.is_processed("buy_sig"));
}

// The tracking registry keeps the feed's watch set in sync with the
// subscription set
#[tokio::test]
async fn test_registry_tracks_active_masters_only() {
    let feed = Arc::new(MockFeed::new());
    let registry = TrackingRegistry::new(feed.clone());

    let mut subs = vec![
        sub(1, SizingPolicy::FixedAmount(1.0), ExitPolicy::Auto),
        sub(2, SizingPolicy::FixedAmount(0.0005), ExitPolicy::Auto),
    ];
    subs[1].master_wallet = "OtherMaster".to_string();

    registry.rebuild(&subs, 0.001).await;
    // Dust-sized subscription does not keep its master watched
    assert_eq!(feed.watched_wallets().len(), 1);
    assert!(feed.watched_wallets().contains(MASTER));
}
