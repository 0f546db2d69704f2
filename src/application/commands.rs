//! CLI commands and handlers
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::refresh_coordinator::RefreshCoordinator;
use crate::application::services::RateMonitorService;
use crate::domain::discovery::CandidateHotel;
use crate::domain::hotel::NewHotel;
use crate::domain::scan::{MonitorResult, ScanOptions};
use crate::infrastructure::feeds::build_feed;
use crate::shared::config::ConfigLoader;
use crate::shared::errors::AppError;
use crate::shared::types::{MonitorConfig, UserId};
use crate::shared::utils::generate_id;

#[derive(Parser)]
#[command(name = "ratewatch")]
#[command(about = "Hotel rate monitor: competitor prices, trends and undercut alerts")]
pub struct Cli {
    /// Log filter directive, e.g. "info" or "ratewatch=debug"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seed hotels from config and run monitoring scans
    Scan {
        /// Path to the TOML config
        #[arg(short, long)]
        config: PathBuf,

        /// Number of scans to run back to back
        #[arg(short, long, default_value_t = 1)]
        rounds: usize,

        /// User id to scan as (random if omitted)
        #[arg(short, long)]
        user: Option<Uuid>,
    },

    /// Rank untracked catalog hotels against the target hotel
    Discover {
        #[arg(short, long)]
        config: PathBuf,

        /// Override discovery.top_k
        #[arg(short, long)]
        top_k: Option<usize>,
    },

    /// Run scans, then print the dashboard projection
    Dashboard {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long, default_value_t = 1)]
        rounds: usize,

        #[arg(short, long)]
        user: Option<Uuid>,
    },
}

#[derive(Serialize)]
struct RoundReport<'a> {
    round: usize,
    result: &'a MonitorResult,
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Scan { config, rounds, user } => {
                Self::execute_scan_command(ConfigLoader::load(config)?, rounds, user).await
            }
            Commands::Discover { config, top_k } => {
                Self::execute_discover_command(ConfigLoader::load(config)?, top_k).await
            }
            Commands::Dashboard { config, rounds, user } => {
                Self::execute_dashboard_command(ConfigLoader::load(config)?, rounds, user).await
            }
        }
    }

    /// Build the service and register the configured hotels for `user_id`
    async fn bootstrap(
        config: &MonitorConfig,
        user_id: UserId,
    ) -> Result<Arc<RateMonitorService>, AppError> {
        let feed = build_feed(config)?;
        info!(
            "🚀 Starting ratewatch with the {} feed, {} hotel(s)",
            feed.vendor(),
            config.hotels.len()
        );
        let service = Arc::new(RateMonitorService::new(config, feed));

        for seed in &config.hotels {
            let new_hotel = NewHotel {
                name: seed.name.clone(),
                location: seed.location.clone(),
                is_target: seed.is_target,
                currency: seed.currency.clone(),
                external_ref: seed.external_ref.clone(),
                star_rating: seed.star_rating,
            };
            let hotel = service.add_hotel(user_id, new_hotel).await?;
            if hotel.is_target_hotel {
                if let Some(embedding) = &config.target_embedding {
                    service.set_hotel_embedding(hotel.id, embedding.clone()).await;
                }
            }
        }

        let candidates = config
            .candidates
            .iter()
            .map(|c| CandidateHotel {
                id: c.id.clone(),
                name: c.name.clone(),
                location: c.location.clone(),
                category: c.category.clone(),
                description: c.description.clone(),
                star_rating: c.star_rating,
                embedding: c.embedding.clone(),
            })
            .collect();
        service.load_candidates(candidates).await;

        Ok(service)
    }

    /// Run `rounds` scans, watching each with the refresh coordinator
    async fn run_rounds(
        service: &Arc<RateMonitorService>,
        config: &MonitorConfig,
        user_id: UserId,
        rounds: usize,
    ) -> Result<Vec<MonitorResult>, AppError> {
        let coordinator = RefreshCoordinator::new(service.clone(), &config.refresh);
        let mut results = Vec::with_capacity(rounds);

        for round in 1..=rounds {
            info!("🔄 Round {}/{}", round, rounds);
            let handle = service
                .trigger_monitor(user_id, config.settings.clone(), ScanOptions::manual())
                .await?;
            let session_id = handle.session().id;
            coordinator.start_polling(user_id, session_id);

            match handle.wait().await {
                Ok(result) => results.push(result),
                Err(e) => warn!("❌ Scan failed: {}", e),
            }
            coordinator.observe_terminal(user_id, session_id);
        }
        Ok(results)
    }

    async fn execute_scan_command(
        config: MonitorConfig,
        rounds: usize,
        user: Option<Uuid>,
    ) -> Result<(), AppError> {
        let user_id = user.unwrap_or_else(generate_id);
        let service = Self::bootstrap(&config, user_id).await?;
        let results = Self::run_rounds(&service, &config, user_id, rounds).await?;

        for (index, result) in results.iter().enumerate() {
            print_json(&RoundReport {
                round: index + 1,
                result,
            })?;
        }
        print_json(&service.alerts_for(user_id, false).await)
    }

    async fn execute_discover_command(
        config: MonitorConfig,
        top_k: Option<usize>,
    ) -> Result<(), AppError> {
        let user_id = generate_id();
        let service = Self::bootstrap(&config, user_id).await?;

        let mut query = service.default_discovery_query();
        if let Some(top_k) = top_k {
            query.top_k = top_k;
        }
        let matches = service.discover_ghost_competitors(user_id, query).await?;
        print_json(&matches)
    }

    async fn execute_dashboard_command(
        config: MonitorConfig,
        rounds: usize,
        user: Option<Uuid>,
    ) -> Result<(), AppError> {
        let user_id = user.unwrap_or_else(generate_id);
        let service = Self::bootstrap(&config, user_id).await?;
        Self::run_rounds(&service, &config, user_id, rounds).await?;

        print_json(&service.get_dashboard(user_id).await)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
