//! Alert domain - undercut and threshold alerts

mod alert_engine;
mod alert_ledger;

pub use alert_engine::AlertEngine;
pub use alert_ledger::AlertLedger;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::price::PriceInfo;
use crate::shared::types::{AlertId, HotelId, UserId};

/// Kinds of alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ThresholdBreach,
    CompetitorUndercut,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ThresholdBreach => "threshold_breach",
            AlertType::CompetitorUndercut => "competitor_undercut",
        }
    }
}

/// Presentation severity. Does not decide whether an alert fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    High,
}

/// An emitted alert. Only `is_read` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub old_price: Option<Decimal>,
    pub new_price: Decimal,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Price state of one hotel as seen by the alert engine
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub user_id: UserId,
    pub hotel_name: String,
    pub info: PriceInfo,
    /// Whether the price was observed in the sweep being evaluated.
    /// Only refreshed snapshots are checked for threshold breaches.
    pub refreshed: bool,
}
