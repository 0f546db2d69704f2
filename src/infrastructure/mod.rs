//! Infrastructure layer - price feed adapters

pub mod feeds;
