//! Application layer - use cases and services

pub mod commands;
pub mod refresh_coordinator;
pub mod services;

pub use commands::{Cli, CommandExecutor, Commands};
pub use refresh_coordinator::{RefreshCoordinator, RefreshState, SessionProbe};
pub use services::{
    AnalysisFilter, DashboardData, HotelAnalysis, HotelView, RateMonitorService, SessionDetail,
};
