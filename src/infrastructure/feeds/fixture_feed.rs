//! Scripted in-memory rate feed

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::hotel::Hotel;
use crate::domain::price::{PriceFeed, RateQuote};
use crate::shared::errors::FetchError;
use crate::shared::types::HotelSeed;

type Script = Vec<Result<Decimal, FetchError>>;

/// Serves scripted rates per hotel, one entry per call. Once a script is
/// exhausted its last entry repeats. Hotels without a script have no rate.
pub struct FixturePriceFeed {
    vendor: String,
    scripts: HashMap<String, Script>,
    cursors: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

fn key(name: &str, location: &str) -> String {
    format!(
        "{}|{}",
        name.trim().to_lowercase(),
        location.trim().to_lowercase()
    )
}

impl FixturePriceFeed {
    pub fn new(vendor: &str) -> Self {
        Self {
            vendor: vendor.to_string(),
            scripts: HashMap::new(),
            cursors: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Negative seed quotes become `RateNotFound` for that round
    pub fn from_seeds(vendor: &str, seeds: &[HotelSeed]) -> Self {
        seeds.iter().fold(Self::new(vendor), |feed, seed| {
            let script = seed
                .quotes
                .iter()
                .map(|&price| {
                    if price < Decimal::ZERO {
                        Err(FetchError::RateNotFound(seed.name.clone()))
                    } else {
                        Ok(price)
                    }
                })
                .collect();
            feed.with_script(&seed.name, &seed.location, script)
        })
    }

    pub fn with_quotes(self, name: &str, location: &str, quotes: Vec<Decimal>) -> Self {
        self.with_script(name, location, quotes.into_iter().map(Ok).collect())
    }

    pub fn with_script(mut self, name: &str, location: &str, script: Script) -> Self {
        self.scripts.insert(key(name, location), script);
        self
    }

    /// Wait this long before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn next_entry(&self, hotel: &Hotel) -> Result<Decimal, FetchError> {
        let key = key(&hotel.name, &hotel.location);
        let Some(script) = self.scripts.get(&key).filter(|s| !s.is_empty()) else {
            return Err(FetchError::RateNotFound(hotel.name.clone()));
        };

        let mut cursors = self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let cursor = cursors.entry(key).or_insert(0);
        let index = (*cursor).min(script.len() - 1);
        *cursor += 1;
        script[index].clone()
    }
}

#[async_trait]
impl PriceFeed for FixturePriceFeed {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    async fn fetch_rate(&self, hotel: &Hotel) -> Result<RateQuote, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let price = self.next_entry(hotel)?;
        debug!("Fixture rate for {}: {} {}", hotel.name, price, hotel.currency);
        Ok(RateQuote {
            price,
            currency: hotel.currency.clone(),
            vendor: self.vendor.clone(),
        })
    }
}
