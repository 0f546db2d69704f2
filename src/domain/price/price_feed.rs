//! Rate feed interface

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::hotel::Hotel;
use crate::shared::errors::FetchError;

/// A rate returned by the feed for one hotel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub price: Decimal,
    pub currency: String,
    pub vendor: String,
}

/// External price-fetch collaborator. Returns a rate or fails.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    fn vendor(&self) -> &str;

    async fn fetch_rate(&self, hotel: &Hotel) -> Result<RateQuote, FetchError>;
}
