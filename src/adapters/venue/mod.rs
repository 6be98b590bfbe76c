//! PumpPortal venue adapter

pub mod client;

pub use client::{PumpPortalClient, VenueConfig};
