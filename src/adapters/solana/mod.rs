//! Solana chain adapters

pub mod feed;
pub mod rpc;
pub mod wallet;

pub use feed::{PollerConfig, SignaturePoller};
pub use rpc::SolanaClient;
pub use wallet::KeyDirectory;
