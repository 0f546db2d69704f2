//! Append-only price history per hotel

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

use super::{PriceInfo, PricePoint, TrendCalculator};
use crate::shared::errors::PriceError;
use crate::shared::types::HotelId;

#[derive(Debug, Default)]
struct PriceSeries {
    points: Vec<PricePoint>,
    currency: String,
}

/// Ordered record of price observations per hotel. Insertion order is
/// chronological order; points are never rewritten.
pub struct PriceHistoryStore {
    series: RwLock<HashMap<HotelId, PriceSeries>>,
}

impl PriceHistoryStore {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Append an observation for a hotel
    pub async fn record(
        &self,
        hotel_id: HotelId,
        price: Decimal,
        currency: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<PricePoint, PriceError> {
        if price < Decimal::ZERO {
            return Err(PriceError::InvalidPrice(price));
        }

        let point = PricePoint { price, recorded_at };
        let mut series = self.series.write().await;
        let entry = series.entry(hotel_id).or_default();
        entry.points.push(point.clone());
        entry.currency = currency.to_string();

        debug!(
            "Recorded {} {} for hotel {} ({} points)",
            price,
            currency,
            hotel_id,
            entry.points.len()
        );
        Ok(point)
    }

    /// Oldest to newest. With a limit, the most recent `limit` points.
    pub async fn history(&self, hotel_id: HotelId, limit: Option<usize>) -> Vec<PricePoint> {
        let series = self.series.read().await;
        let Some(entry) = series.get(&hotel_id) else {
            return Vec::new();
        };
        let skip = match limit {
            Some(limit) => entry.points.len().saturating_sub(limit),
            None => 0,
        };
        entry.points[skip..].to_vec()
    }

    /// `(previous, current)`; `previous` is `None` with fewer than two points
    pub async fn latest_two(
        &self,
        hotel_id: HotelId,
    ) -> Result<(Option<PricePoint>, PricePoint), PriceError> {
        let series = self.series.read().await;
        let points = series
            .get(&hotel_id)
            .map(|entry| entry.points.as_slice())
            .unwrap_or_default();

        match points {
            [] => Err(PriceError::UnknownHotel(hotel_id)),
            [current] => Ok((None, current.clone())),
            [.., previous, current] => Ok((Some(previous.clone()), current.clone())),
        }
    }

    /// Derived price state, recomputed from the last two points on every read
    pub async fn price_info(&self, hotel_id: HotelId) -> Option<PriceInfo> {
        let series = self.series.read().await;
        let entry = series.get(&hotel_id)?;
        let (previous, current) = match entry.points.as_slice() {
            [] => return None,
            [current] => (None, current),
            [.., previous, current] => (Some(previous), current),
        };

        let signal = TrendCalculator::derive_or_stable(previous, current);
        Some(PriceInfo {
            hotel_id,
            current_price: current.price,
            previous_price: previous.map(|p| p.price),
            currency: entry.currency.clone(),
            trend: signal.trend,
            change_percent: signal.change_percent,
            recorded_at: current.recorded_at,
        })
    }
}

impl Default for PriceHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
