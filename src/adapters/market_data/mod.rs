//! Market data adapters

pub mod price;

pub use price::JupiterPriceClient;
