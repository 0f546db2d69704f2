//! Scan domain - monitoring sweeps, their sessions and query logs

mod scan_orchestrator;
mod session_ledger;

pub use scan_orchestrator::{ScanHandle, ScanOrchestrator};
pub use session_ledger::ScanLedger;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::types::{HotelId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Manual,
    Scheduled,
}

/// `Pending` moves exactly once to one of the terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }
}

/// One monitoring sweep across a user's hotel set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub hotels_count: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PriceCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Failed,
}

/// One per-hotel fetch attempt within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLog {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub hotel_name: String,
    pub location: String,
    pub action_type: ActionType,
    pub status: QueryStatus,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub vendor: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregated outcome of one scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorResult {
    pub hotels_checked: usize,
    pub prices_updated: usize,
    pub alerts_generated: usize,
    pub errors: Vec<String>,
}

/// Which hotels a scan covers
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HotelScope {
    /// Target plus every competitor
    #[default]
    All,
    /// Only the listed hotels that belong to the user
    Only(Vec<HotelId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub session_type: SessionType,
    pub hotel_scope: HotelScope,
}

impl ScanOptions {
    pub fn manual() -> Self {
        Self {
            session_type: SessionType::Manual,
            hotel_scope: HotelScope::All,
        }
    }

    pub fn scheduled() -> Self {
        Self {
            session_type: SessionType::Scheduled,
            hotel_scope: HotelScope::All,
        }
    }

    pub fn with_scope(mut self, hotel_ids: Vec<HotelId>) -> Self {
        self.hotel_scope = HotelScope::Only(hotel_ids);
        self
    }
}
