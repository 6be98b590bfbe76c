#![allow(dead_code)]
//! Mirrorbot - Solana Copy-Trade Engine Library
//!
//! Watches designated master wallets, classifies their swaps from balance
//! deltas, and replicates proportional trades for follower subscriptions
//! through an off-chain venue quoting API, then manages the resulting
//! positions (proportional sell-mirroring or TP/SL exits).
//!
//! # Modules
//!
//! - `domain`: Core entities (Subscription, Position, ExecutionRecord, DedupLedger)
//! - `ports`: Trait abstractions (EventFeed, ChainReader, VenueClient, PriceFeed, TransactionSigner)
//! - `adapters`: External implementations (Solana RPC, PumpPortal, Jupiter prices, CLI)
//! - `engine`: Replication pipeline (tracking, classifier, swap, replicator, positions, store)
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
