//! Dedup & Exclusion Ledger
//!
//! The chain feed delivers at-least-once: the same signature can arrive
//! twice on reconnect or replay. `mark_processed` inserts and reports
//! whether the signature was new, so callers mark before replicating and
//! a concurrent duplicate observes the signature as already processed.
//!
//! The exclusion set holds signatures that must never be replicated,
//! primarily the engine's own submitted transactions (feedback-loop guard).

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct DedupLedger {
    processed: Mutex<HashSet<String>>,
    excluded: Mutex<HashSet<String>>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the processed set, e.g. from persisted execution records at
    /// startup so restart cannot re-replicate.
    pub fn seed_processed<I: IntoIterator<Item = String>>(&self, signatures: I) {
        let mut processed = self.processed.lock().unwrap();
        processed.extend(signatures);
    }

    pub fn is_processed(&self, signature: &str) -> bool {
        self.processed.lock().unwrap().contains(signature)
    }

    /// Insert the signature into the processed set. Returns `true` if it
    /// was newly inserted, `false` if it had already been processed.
    pub fn mark_processed(&self, signature: &str) -> bool {
        self.processed.lock().unwrap().insert(signature.to_string())
    }

    pub fn is_excluded(&self, signature: &str) -> bool {
        self.excluded.lock().unwrap().contains(signature)
    }

    /// Add a signature to the exclusion set (idempotent)
    pub fn exclude(&self, signature: &str) {
        self.excluded.lock().unwrap().insert(signature.to_string());
    }

    pub fn processed_count(&self) -> usize {
        self.processed.lock().unwrap().len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.lock().unwrap().len()
    }
}
