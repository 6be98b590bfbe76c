//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Wallet activity feeds (signature notifications)
//! - Chain access (balance deltas, balances, transaction submission)
//! - Swap venue (unsigned transaction building)
//! - Price lookups and transaction signing

pub mod chain;
pub mod feed;
pub mod mocks;
pub mod price;
pub mod signer;
pub mod venue;

pub use chain::{AssetDelta, ChainError, ChainReader, NATIVE_MINT};
pub use feed::{EventFeed, FeedError, WalletEvent};
pub use price::{PriceError, PriceFeed};
pub use signer::{SignerError, TransactionSigner};
pub use venue::{TradeRequest, VenueClient, VenueError};
