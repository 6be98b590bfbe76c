//! Domain Layer - Core copy-trade entities
//!
//! Pure domain types with no external dependencies. All chain and venue
//! interactions happen through the ports layer.
//!
//! - `subscription`: a follower's copy-trade configuration for one master
//! - `position`: per-(subscription, token) open stake lifecycle
//! - `execution_record`: append-only replication audit rows
//! - `ledger`: dedup and exclusion sets for at-least-once event delivery

pub mod execution_record;
pub mod ledger;
pub mod position;
pub mod subscription;

pub use execution_record::{ExecutionRecord, ExecutionStatus, TradeDirection};
pub use ledger::DedupLedger;
pub use position::{ExitReason, Position, PositionError, PositionStatus};
pub use subscription::{
    ExitPolicy, SizingPolicy, Subscription, SubscriptionError, SubscriptionStatus,
    DEFAULT_DUST_THRESHOLD,
};
