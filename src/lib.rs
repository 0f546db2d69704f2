//! Ratewatch - hotel rate monitoring and alerting engine
//! Built with Domain-Driven Design principles

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{RateMonitorService, RefreshCoordinator};
pub use domain::alert::AlertEngine;
pub use domain::discovery::DiscoveryEngine;
pub use domain::price::{PriceHistoryStore, TrendCalculator};
pub use domain::scan::ScanOrchestrator;
pub use shared::errors::AppError;
