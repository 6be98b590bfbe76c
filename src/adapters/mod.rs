//! Adapters Layer - Concrete implementations of ports
//!
//! Each adapter wraps one external dependency:
//! - `solana`: RPC access, signature polling, follower key signing
//! - `venue`: PumpPortal local-transaction API
//! - `market_data`: Jupiter price lookups

pub mod cli;
pub mod market_data;
pub mod solana;
pub mod venue;
