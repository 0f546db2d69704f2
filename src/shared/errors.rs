//! Error handling for the application

use rust_decimal::Decimal;
use thiserror::Error;

use crate::shared::types::{AlertId, HotelId, SessionId, UserId};

/// Price-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceError {
    #[error("Invalid price: {0} (must be >= 0)")]
    InvalidPrice(Decimal),

    #[error("Previous price is zero, percent change is undefined")]
    DegenerateBaseline,

    #[error("Percent change from {0} to {1} is out of range")]
    Overflow(Decimal, Decimal),

    #[error("No price history for hotel {0}")]
    UnknownHotel(HotelId),
}

/// Price feed errors, one per failed per-hotel fetch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Price source unavailable: {0}")]
    Unavailable(String),

    #[error("No rate published for {0}")]
    RateNotFound(String),

    #[error("Fetch timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid response from price source: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    /// Whether this failure says the source itself is down rather than
    /// something about one hotel.
    pub fn is_systemic(&self) -> bool {
        matches!(self, FetchError::Unavailable(_) | FetchError::Timeout(_))
    }
}

/// Scan-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("A scan is already in progress for user {0}")]
    ScanAlreadyInProgress(UserId),

    #[error("No hotels configured for user {0}")]
    NoHotelsConfigured(UserId),

    #[error("Price source outage: {0}")]
    CollaboratorOutage(String),

    #[error("Scan session not found: {0}")]
    SessionNotFound(SessionId),
}

/// Hotel registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HotelError {
    #[error("Hotel not found: {0}")]
    NotFound(HotelId),

    #[error("User {0} already has a target hotel")]
    TargetAlreadySet(UserId),

    #[error("Hotel name must not be empty")]
    EmptyName,
}

/// Alert errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("Alert not found: {0}")]
    NotFound(AlertId),
}

/// Discovery errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error("No embedding available for hotel {0}")]
    EmbeddingUnavailable(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Hotel(#[from] HotelError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
