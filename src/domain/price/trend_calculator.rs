//! Trend derivation from consecutive price points

use rust_decimal::Decimal;
use tracing::warn;

use super::{PricePoint, Trend};
use crate::shared::errors::PriceError;
use crate::shared::utils::calculate_percentage_change;

/// Trend fields of a `PriceInfo`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignal {
    pub trend: Trend,
    pub change_percent: Decimal,
}

impl TrendSignal {
    pub fn stable() -> Self {
        Self {
            trend: Trend::Stable,
            change_percent: Decimal::ZERO,
        }
    }
}

/// Derives trend direction and percent change from the two latest points
pub struct TrendCalculator;

impl TrendCalculator {
    /// Any nonzero change is a trend; there is no dead-zone.
    pub fn derive(
        previous: Option<&PricePoint>,
        current: &PricePoint,
    ) -> Result<TrendSignal, PriceError> {
        let Some(previous) = previous else {
            return Ok(TrendSignal::stable());
        };

        let change_percent = calculate_percentage_change(previous.price, current.price)?;
        let trend = if change_percent > Decimal::ZERO {
            Trend::Up
        } else if change_percent < Decimal::ZERO {
            Trend::Down
        } else {
            Trend::Stable
        };

        Ok(TrendSignal {
            trend,
            change_percent,
        })
    }

    /// Like `derive`, but a zero baseline or an out-of-range change
    /// degrades to stable / 0%
    pub fn derive_or_stable(previous: Option<&PricePoint>, current: &PricePoint) -> TrendSignal {
        match Self::derive(previous, current) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("⚠️  {}; treating move to {} as stable", e, current.price);
                TrendSignal::stable()
            }
        }
    }

    /// Strictly greater than the threshold in magnitude
    pub fn is_significant_change(change_percent: Decimal, threshold_percent: Decimal) -> bool {
        change_percent.abs() > threshold_percent
    }
}
