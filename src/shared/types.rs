//! Common types used across the application

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type HotelId = Uuid;
pub type SessionId = Uuid;
pub type AlertId = Uuid;

/// Notification channel toggles. Delivery happens outside the engine,
/// these are carried so callers can route emitted alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationChannels {
    pub email: bool,
    pub push: bool,
    pub sms: bool,
}

impl Default for NotificationChannels {
    fn default() -> Self {
        Self {
            email: true,
            push: false,
            sms: false,
        }
    }
}

/// Per-user monitoring settings. Owned by the settings surface, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    /// Alert sensitivity: a price move larger than this (in percent) breaches.
    pub threshold_percent: Decimal,
    /// Cadence for the external scheduler.
    pub check_frequency_minutes: u32,
    pub notifications: NotificationChannels,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            threshold_percent: Decimal::from(10),
            check_frequency_minutes: 60,
            notifications: NotificationChannels::default(),
        }
    }
}

/// Scan execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_concurrent_fetches: usize,
    pub fetch_timeout_ms: u64,
    /// Share of fetches failing with a systemic error at which the whole
    /// sweep counts as an outage.
    pub outage_ratio: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            fetch_timeout_ms: 10_000,
            outage_ratio: 1.0,
        }
    }
}

/// Alert engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub undercut_high_severity_percent: Decimal,
    pub rearm_cooldown_minutes: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            undercut_high_severity_percent: Decimal::from(5),
            rearm_cooldown_minutes: 0,
        }
    }
}

/// Refresh polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 3_000,
            timeout_ms: 20_000,
        }
    }
}

/// Ghost competitor discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub top_k: usize,
    pub min_similarity: f32,
    pub embedding_dim: Option<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.7,
            embedding_dim: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Fixture,
    Http,
}

/// Price feed selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub kind: FeedKind,
    pub base_url: Option<String>,
    pub vendor: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            kind: FeedKind::Fixture,
            base_url: None,
            vendor: "fixture".to_string(),
        }
    }
}

/// Hotel seed entry for the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelSeed {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub is_target: bool,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub external_ref: Option<String>,
    pub star_rating: Option<u8>,
    /// Scripted rates for the fixture feed, one per scan round. A
    /// negative entry scripts a failed fetch for that round.
    #[serde(default)]
    pub quotes: Vec<Decimal>,
}

/// Discovery corpus entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSeed {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub star_rating: Option<u8>,
    pub embedding: Vec<f32>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub scan: ScanConfig,
    pub alerts: AlertConfig,
    pub refresh: RefreshConfig,
    pub discovery: DiscoveryConfig,
    pub feed: FeedConfig,
    pub settings: UserSettings,
    pub hotels: Vec<HotelSeed>,
    pub candidates: Vec<CandidateSeed>,
    pub target_embedding: Option<Vec<f32>>,
}
