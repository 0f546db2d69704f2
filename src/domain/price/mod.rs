//! Price domain - price history, trend signals and the rate feed seam

mod price_feed;
mod price_history;
mod trend_calculator;

pub use price_feed::{PriceFeed, RateQuote};
pub use price_history::PriceHistoryStore;
pub use trend_calculator::{TrendCalculator, TrendSignal};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::types::HotelId;
use crate::shared::utils::round_percent;

/// One observed rate. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Direction of the latest price move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }
}

/// Current price state of a hotel, derived from its last two price points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub hotel_id: HotelId,
    pub current_price: Decimal,
    pub previous_price: Option<Decimal>,
    pub currency: String,
    pub trend: Trend,
    /// Full precision, signed
    pub change_percent: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl PriceInfo {
    /// Change rounded to one decimal place
    pub fn display_change_percent(&self) -> Decimal {
        round_percent(self.change_percent)
    }
}
