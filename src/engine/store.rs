//! Engine state persistence
//!
//! Crash recovery for the replication pipeline: execution records and
//! positions persist as JSON documents under the data directory, and the
//! dedup ledger is reseeded from the records on startup so a restart
//! never re-replicates an already-recorded master transaction.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::info;

use crate::domain::{ExecutionRecord, Position, Subscription};

const RECORDS_FILE: &str = "execution_records.json";
const POSITIONS_FILE: &str = "positions.json";
const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create data directory: {0}")]
    DirectoryError(String),
    #[error("Failed to serialize state: {0}")]
    SerializationError(String),
    #[error("Failed to deserialize state: {0}")]
    DeserializationError(String),
    #[error("Failed to write state file: {0}")]
    WriteError(String),
    #[error("Failed to read state file: {0}")]
    ReadError(String),
}

/// JSON-file store for execution records and positions
pub struct StateStore {
    data_dir: PathBuf,
    records: Mutex<Vec<ExecutionRecord>>,
    positions: Mutex<HashMap<String, Position>>,
}

impl StateStore {
    /// Open the store, loading any existing state from `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| StoreError::DirectoryError(e.to_string()))?;

        let records: Vec<ExecutionRecord> =
            load_json(&data_dir.join(RECORDS_FILE))?.unwrap_or_default();
        let positions: HashMap<String, Position> =
            load_json(&data_dir.join(POSITIONS_FILE))?.unwrap_or_default();

        info!(
            records = records.len(),
            positions = positions.len(),
            "State store opened from {}",
            data_dir.display()
        );

        Ok(Self {
            data_dir,
            records: Mutex::new(records),
            positions: Mutex::new(positions),
        })
    }

    /// Append an execution record and persist
    pub fn append_record(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        records.push(record);
        write_json(&self.data_dir.join(RECORDS_FILE), &*records)
    }

    /// All persisted execution records
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Master signatures of every persisted record, for ledger seeding
    pub fn recorded_signatures(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.master_signature.clone())
            .collect()
    }

    /// Upsert a position (keyed by subscription and mint) and persist
    pub fn save_position(&self, position: &Position) -> Result<(), StoreError> {
        let key = position_key(position.subscription_id, &position.mint);
        let mut positions = self.positions.lock().unwrap();
        positions.insert(key, position.clone());
        write_json(&self.data_dir.join(POSITIONS_FILE), &*positions)
    }

    pub fn load_position(&self, subscription_id: u64, mint: &str) -> Option<Position> {
        self.positions
            .lock()
            .unwrap()
            .get(&position_key(subscription_id, mint))
            .cloned()
    }

    /// All persisted positions
    pub fn positions(&self) -> Vec<Position> {
        self.positions.lock().unwrap().values().cloned().collect()
    }

    /// Load the subscription set from the data directory
    pub fn load_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(load_json(&self.data_dir.join(SUBSCRIPTIONS_FILE))?.unwrap_or_default())
    }

    /// Persist the subscription set
    pub fn save_subscriptions(&self, subscriptions: &[Subscription]) -> Result<(), StoreError> {
        write_json(&self.data_dir.join(SUBSCRIPTIONS_FILE), &subscriptions)
    }
}

/// In-memory subscription set shared across the engine
#[derive(Default)]
pub struct SubscriptionStore {
    subscriptions: std::sync::RwLock<HashMap<u64, Subscription>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let map = subscriptions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            subscriptions: std::sync::RwLock::new(map),
        }
    }

    pub fn upsert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .unwrap()
            .insert(subscription.id, subscription);
    }

    pub fn remove(&self, id: u64) -> Option<Subscription> {
        self.subscriptions.write().unwrap().remove(&id)
    }

    pub fn all(&self) -> Vec<Subscription> {
        self.subscriptions.read().unwrap().values().cloned().collect()
    }

    /// Running subscriptions copying `master` that clear the dust threshold
    pub fn active_for_master(&self, master: &str, dust_threshold: f64) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .unwrap()
            .values()
            .filter(|s| s.master_wallet == master && s.is_active_for_tracking(dust_threshold))
            .cloned()
            .collect()
    }
}

fn position_key(subscription_id: u64, mint: &str) -> String {
    format!("{}:{}", subscription_id, mint)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).map_err(|e| StoreError::ReadError(e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StoreError::DeserializationError(e.to_string()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    fs::write(path, content).map_err(|e| StoreError::WriteError(e.to_string()))
}
