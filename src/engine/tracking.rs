//! Tracking Registry
//!
//! Maintains the live set of master wallets being watched, derived from
//! active subscriptions. Wallets are refcounted: the feed adapter is
//! asked to start watching on the 0->1 transition and to stop on 1->0.
//! Feed failures are logged and reconciled on the next rebuild pass,
//! never treated as fatal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::Subscription;
use crate::ports::feed::EventFeed;

#[derive(Debug, Default)]
struct RegistryState {
    /// Active-subscription count per master wallet
    refcounts: HashMap<String, u32>,
    /// Wallets the feed adapter has confirmed watching
    confirmed: HashSet<String>,
}

/// Refcounted registry of watched master wallets
pub struct TrackingRegistry {
    feed: Arc<dyn EventFeed>,
    state: Mutex<RegistryState>,
}

impl TrackingRegistry {
    pub fn new(feed: Arc<dyn EventFeed>) -> Self {
        Self {
            feed,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Increment interest in a master wallet; 0->1 starts the watch
    pub async fn register(&self, master: &str) {
        let needs_watch = {
            let mut state = self.state.lock().await;
            let count = state.refcounts.entry(master.to_string()).or_insert(0);
            *count += 1;
            *count == 1 && !state.confirmed.contains(master)
        };

        if needs_watch {
            self.try_watch(master).await;
        }
    }

    /// Decrement interest in a master wallet; 1->0 stops the watch
    pub async fn unregister(&self, master: &str) {
        let needs_unwatch = {
            let mut state = self.state.lock().await;
            match state.refcounts.get_mut(master) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    false
                }
                Some(_) => {
                    state.refcounts.remove(master);
                    state.confirmed.contains(master)
                }
                None => false,
            }
        };

        // The wallet stays in `confirmed` until the feed accepts the
        // unwatch, so a failure here is retried on the next rebuild
        if needs_unwatch {
            match self.feed.unwatch(master).await {
                Ok(()) => {
                    self.state.lock().await.confirmed.remove(master);
                    debug!(wallet = %master, "Stopped watching wallet");
                }
                Err(e) => {
                    warn!(wallet = %master, error = %e, "Failed to unwatch wallet, will retry on next rebuild");
                }
            }
        }
    }

    /// Recompute the watched set from the subscription list and reconcile
    /// with the feed adapter. Idempotent; also retries watches that failed
    /// on a previous pass.
    pub async fn rebuild(&self, subscriptions: &[Subscription], dust_threshold: f64) {
        let mut wanted: HashMap<String, u32> = HashMap::new();
        for sub in subscriptions {
            if sub.is_active_for_tracking(dust_threshold) {
                *wanted.entry(sub.master_wallet.clone()).or_insert(0) += 1;
            }
        }

        // Compute the diff under the lock, perform feed calls outside it
        let (to_watch, to_unwatch) = {
            let mut state = self.state.lock().await;

            let to_unwatch: Vec<String> = state
                .confirmed
                .iter()
                .filter(|w| !wanted.contains_key(*w))
                .cloned()
                .collect();

            let to_watch: Vec<String> = wanted
                .keys()
                .filter(|w| !state.confirmed.contains(*w))
                .cloned()
                .collect();

            state.refcounts = wanted;
            (to_watch, to_unwatch)
        };

        for wallet in to_unwatch {
            match self.feed.unwatch(&wallet).await {
                Ok(()) => {
                    self.state.lock().await.confirmed.remove(&wallet);
                    debug!(wallet = %wallet, "Stopped watching wallet");
                }
                Err(e) => {
                    warn!(wallet = %wallet, error = %e, "Failed to unwatch wallet, will retry on next rebuild");
                }
            }
        }

        for wallet in to_watch {
            self.try_watch(&wallet).await;
        }
    }

    /// Wallets currently confirmed as watched
    pub async fn watched(&self) -> Vec<String> {
        self.state.lock().await.confirmed.iter().cloned().collect()
    }

    async fn try_watch(&self, wallet: &str) {
        match self.feed.watch(wallet).await {
            Ok(()) => {
                self.state
                    .lock()
                    .await
                    .confirmed
                    .insert(wallet.to_string());
                debug!(wallet = %wallet, "Watching wallet");
            }
            Err(e) => {
                warn!(wallet = %wallet, error = %e, "Failed to watch wallet, will retry on next rebuild");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitPolicy, SizingPolicy, SubscriptionStatus, DEFAULT_DUST_THRESHOLD};
    use crate::ports::mocks::MockFeed;

    fn sub(id: u64, master: &str) -> Subscription {
        Subscription::new(
            id,
            format!("follower{}", id),
            master.to_string(),
            SizingPolicy::FixedAmount(1.0),
            ExitPolicy::Auto,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_is_refcounted() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        registry.register("master1").await;
        registry.register("master1").await;
        assert_eq!(feed.watched_wallets().len(), 1);

        registry.unregister("master1").await;
        assert_eq!(feed.watched_wallets().len(), 1);

        registry.unregister("master1").await;
        assert!(feed.watched_wallets().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_reconciles() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        let subs = vec![sub(1, "master1"), sub(2, "master2"), sub(3, "master1")];
        registry.rebuild(&subs, DEFAULT_DUST_THRESHOLD).await;
        assert_eq!(feed.watched_wallets().len(), 2);

        // master2's only subscription pauses
        let mut subs = subs;
        subs[1].status = SubscriptionStatus::Paused;
        registry.rebuild(&subs, DEFAULT_DUST_THRESHOLD).await;
        assert_eq!(feed.watched_wallets().len(), 1);
        assert!(feed.watched_wallets().contains("master1"));
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        let subs = vec![sub(1, "master1")];
        registry.rebuild(&subs, DEFAULT_DUST_THRESHOLD).await;
        registry.rebuild(&subs, DEFAULT_DUST_THRESHOLD).await;
        assert_eq!(feed.watched_wallets().len(), 1);
        assert_eq!(registry.watched().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_watch_retried_on_next_rebuild() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        feed.set_failing(true);
        registry.rebuild(&[sub(1, "master1")], DEFAULT_DUST_THRESHOLD).await;
        assert!(feed.watched_wallets().is_empty());
        assert!(registry.watched().await.is_empty());

        feed.set_failing(false);
        registry.rebuild(&[sub(1, "master1")], DEFAULT_DUST_THRESHOLD).await;
        assert_eq!(feed.watched_wallets().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_unwatch_retried_on_next_rebuild() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        registry.register("master1").await;
        assert_eq!(feed.watched_wallets().len(), 1);

        // Feed rejects the unwatch; the registry must not forget the
        // wallet, or the adapter would keep polling it forever
        feed.set_failing(true);
        registry.unregister("master1").await;
        assert_eq!(feed.watched_wallets().len(), 1);
        assert_eq!(registry.watched().await.len(), 1);

        feed.set_failing(false);
        registry.rebuild(&[], DEFAULT_DUST_THRESHOLD).await;
        assert!(feed.watched_wallets().is_empty());
        assert!(registry.watched().await.is_empty());
    }

    #[tokio::test]
    async fn test_dust_subscription_not_tracked() {
        let feed = Arc::new(MockFeed::new());
        let registry = TrackingRegistry::new(feed.clone());

        let mut s = sub(1, "master1");
        s.sizing = SizingPolicy::FixedAmount(0.0005);
        registry.rebuild(&[s], DEFAULT_DUST_THRESHOLD).await;
        assert!(feed.watched_wallets().is_empty());
    }
}
