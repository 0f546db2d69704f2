//! Application services and use cases

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::refresh_coordinator::SessionProbe;
use crate::domain::alert::{Alert, AlertEngine, AlertLedger};
use crate::domain::discovery::{CandidateHotel, DiscoveryEngine, DiscoveryQuery, GhostMatch};
use crate::domain::hotel::{Hotel, HotelRegistry, NewHotel};
use crate::domain::price::{PriceFeed, PriceHistoryStore, PriceInfo, PricePoint, Trend};
use crate::domain::scan::{
    QueryLog, ScanHandle, ScanLedger, ScanOptions, ScanOrchestrator, ScanSession, SessionStatus,
};
use crate::shared::errors::{AlertError, DiscoveryError, HotelError, ScanError};
use crate::shared::types::{AlertId, HotelId, MonitorConfig, SessionId, UserId, UserSettings};

const RECENT_SEARCHES_LIMIT: usize = 10;
const RECENT_SESSIONS_LIMIT: usize = 5;
const SCAN_HISTORY_LIMIT: usize = 20;

/// A hotel with its current price state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelView {
    pub hotel: Hotel,
    pub price: Option<PriceInfo>,
}

/// Read projection behind the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub target_hotel: Option<HotelView>,
    pub competitors: Vec<HotelView>,
    /// Latest query logs across sessions, newest first
    pub recent_searches: Vec<QueryLog>,
    /// Finished sessions, newest first
    pub scan_history: Vec<ScanSession>,
    /// Latest sessions including a pending one
    pub recent_sessions: Vec<ScanSession>,
    pub unread_alerts_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Ledger revision plus the user's invalidation epoch at build time
type DashboardKey = (u64, u64);

#[derive(Debug, Clone)]
struct CachedDashboard {
    key: DashboardKey,
    data: DashboardData,
}

#[derive(Debug, Default)]
struct DashboardCache {
    entries: HashMap<UserId, CachedDashboard>,
    /// Bumped by every hotel or alert mutation of the user
    epochs: HashMap<UserId, u64>,
}

/// Filter for `get_analysis_with_filters`. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AnalysisFilter {
    pub target_only: bool,
    pub location: Option<String>,
    pub min_star_rating: Option<u8>,
    pub trend: Option<Trend>,
}

impl AnalysisFilter {
    pub fn target() -> Self {
        Self {
            target_only: true,
            ..Self::default()
        }
    }

    fn matches(&self, hotel: &Hotel, price: Option<&PriceInfo>) -> bool {
        if self.target_only && !hotel.is_target_hotel {
            return false;
        }
        if let Some(location) = &self.location {
            if !hotel.location.trim().eq_ignore_ascii_case(location.trim()) {
                return false;
            }
        }
        if let Some(min_stars) = self.min_star_rating {
            if hotel.star_rating.map_or(true, |stars| stars < min_stars) {
                return false;
            }
        }
        if let Some(trend) = self.trend {
            if price.map(|p| p.trend) != Some(trend) {
                return false;
            }
        }
        true
    }
}

/// Filtered per-hotel analysis row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotelAnalysis {
    pub hotel_id: HotelId,
    pub name: String,
    pub location: String,
    pub is_target_hotel: bool,
    pub star_rating: Option<u8>,
    pub price: Option<PriceInfo>,
    pub history: Vec<PricePoint>,
}

/// A finished or running scan reconstructed from its logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    pub session: ScanSession,
    pub logs: Vec<QueryLog>,
}

/// Facade over the monitoring core: every external operation goes through here
pub struct RateMonitorService {
    hotels: Arc<HotelRegistry>,
    history: Arc<PriceHistoryStore>,
    alerts: Arc<AlertLedger>,
    ledger: Arc<ScanLedger>,
    orchestrator: ScanOrchestrator,
    discovery: DiscoveryEngine,
    discovery_query: DiscoveryQuery,
    corpus: RwLock<Vec<CandidateHotel>>,
    embeddings: RwLock<HashMap<HotelId, Vec<f32>>>,
    dashboards: RwLock<DashboardCache>,
}

impl RateMonitorService {
    pub fn new(config: &MonitorConfig, feed: Arc<dyn PriceFeed>) -> Self {
        let hotels = Arc::new(HotelRegistry::new());
        let history = Arc::new(PriceHistoryStore::new());
        let alerts = Arc::new(AlertLedger::new());
        let ledger = Arc::new(ScanLedger::new());
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(&hotels),
            Arc::clone(&history),
            Arc::clone(&alerts),
            Arc::clone(&ledger),
            feed,
            Arc::new(AlertEngine::new(config.alerts.clone())),
            config.scan.clone(),
        );

        Self {
            hotels,
            history,
            alerts,
            ledger,
            orchestrator,
            discovery: DiscoveryEngine::new(&config.discovery),
            discovery_query: DiscoveryQuery {
                top_k: config.discovery.top_k,
                min_similarity: config.discovery.min_similarity,
            },
            corpus: RwLock::new(Vec::new()),
            embeddings: RwLock::new(HashMap::new()),
            dashboards: RwLock::new(DashboardCache::default()),
        }
    }

    /// Dashboard projection. Served from cache until the scan ledger
    /// moves or a hotel or alert mutation invalidates it.
    pub async fn get_dashboard(&self, user_id: UserId) -> DashboardData {
        let key = {
            let cache = self.dashboards.read().await;
            let key = (
                self.ledger.revision(),
                cache.epochs.get(&user_id).copied().unwrap_or(0),
            );
            if let Some(cached) = cache.entries.get(&user_id) {
                if cached.key == key {
                    debug!("Dashboard cache hit for user {}", user_id);
                    return cached.data.clone();
                }
            }
            key
        };

        let data = self.build_dashboard(user_id).await;
        self.store_dashboard(user_id, key, data.clone()).await;
        data
    }

    /// Cache a projection unless a mutation ran while it was being built
    async fn store_dashboard(&self, user_id: UserId, key: DashboardKey, data: DashboardData) -> bool {
        let mut cache = self.dashboards.write().await;
        let epoch = cache.epochs.get(&user_id).copied().unwrap_or(0);
        if epoch != key.1 {
            debug!("Dashboard for user {} went stale while building, not cached", user_id);
            return false;
        }
        cache.entries.insert(user_id, CachedDashboard { key, data });
        true
    }

    async fn build_dashboard(&self, user_id: UserId) -> DashboardData {
        let mut target_hotel = None;
        let mut competitors = Vec::new();
        for hotel in self.hotels.hotels_for(user_id).await {
            let view = HotelView {
                price: self.history.price_info(hotel.id).await,
                hotel,
            };
            if view.hotel.is_target_hotel {
                target_hotel = Some(view);
            } else {
                competitors.push(view);
            }
        }

        let scan_history = self
            .ledger
            .sessions_for(user_id, usize::MAX)
            .into_iter()
            .filter(|s| s.status.is_terminal())
            .take(SCAN_HISTORY_LIMIT)
            .collect();

        DashboardData {
            target_hotel,
            competitors,
            recent_searches: self.ledger.recent_logs_for(user_id, RECENT_SEARCHES_LIMIT),
            scan_history,
            recent_sessions: self.ledger.sessions_for(user_id, RECENT_SESSIONS_LIMIT),
            unread_alerts_count: self.alerts.unread_count(user_id).await,
            last_updated: Utc::now(),
        }
    }

    async fn invalidate_dashboard(&self, user_id: UserId) {
        let mut cache = self.dashboards.write().await;
        *cache.epochs.entry(user_id).or_insert(0) += 1;
        if cache.entries.remove(&user_id).is_some() {
            debug!("Dashboard cache invalidated for user {}", user_id);
        }
    }

    /// Start a scan. The returned handle carries the pending session;
    /// dropping it leaves the sweep running in the background.
    pub async fn trigger_monitor(
        &self,
        user_id: UserId,
        settings: UserSettings,
        options: ScanOptions,
    ) -> Result<ScanHandle, ScanError> {
        self.orchestrator.start_scan(user_id, settings, options).await
    }

    pub async fn add_hotel(&self, user_id: UserId, new_hotel: NewHotel) -> Result<Hotel, HotelError> {
        let hotel = self.hotels.add(user_id, new_hotel).await?;
        self.invalidate_dashboard(user_id).await;
        Ok(hotel)
    }

    /// Drop a hotel from future scans. Its query logs and alerts stay.
    pub async fn delete_hotel(&self, hotel_id: HotelId) -> Result<(), HotelError> {
        let removed = self.hotels.remove(hotel_id).await?;
        self.embeddings.write().await.remove(&hotel_id);
        self.invalidate_dashboard(removed.user_id).await;
        Ok(())
    }

    pub async fn get_analysis_with_filters(
        &self,
        user_id: UserId,
        filter: &AnalysisFilter,
    ) -> Vec<HotelAnalysis> {
        let mut rows = Vec::new();
        for hotel in self.hotels.hotels_for(user_id).await {
            let price = self.history.price_info(hotel.id).await;
            if !filter.matches(&hotel, price.as_ref()) {
                continue;
            }
            rows.push(HotelAnalysis {
                hotel_id: hotel.id,
                history: self.history.history(hotel.id, None).await,
                name: hotel.name,
                location: hotel.location,
                is_target_hotel: hotel.is_target_hotel,
                star_rating: hotel.star_rating,
                price,
            });
        }
        rows
    }

    pub async fn mark_alert_read(&self, alert_id: AlertId) -> Result<(), AlertError> {
        let alert = self.alerts.mark_read(alert_id).await?;
        self.invalidate_dashboard(alert.user_id).await;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> usize {
        let marked = self.alerts.mark_all_read(user_id).await;
        if marked > 0 {
            self.invalidate_dashboard(user_id).await;
        }
        marked
    }

    /// Newest first
    pub async fn alerts_for(&self, user_id: UserId, unread_only: bool) -> Vec<Alert> {
        self.alerts.for_user(user_id, unread_only).await
    }

    pub fn session_detail(&self, session_id: SessionId) -> Result<SessionDetail, ScanError> {
        let session = self
            .ledger
            .session(session_id)
            .ok_or(ScanError::SessionNotFound(session_id))?;
        Ok(SessionDetail {
            logs: self.ledger.logs_for(session_id),
            session,
        })
    }

    pub fn scan_history(&self, user_id: UserId, limit: usize) -> Vec<ScanSession> {
        self.ledger.sessions_for(user_id, limit)
    }

    pub async fn hotels_for(&self, user_id: UserId) -> Vec<Hotel> {
        self.hotels.hotels_for(user_id).await
    }

    pub async fn price_history(&self, hotel_id: HotelId, limit: Option<usize>) -> Vec<PricePoint> {
        self.history.history(hotel_id, limit).await
    }

    /// Profile embedding of a tracked hotel, used by discovery
    pub async fn set_hotel_embedding(&self, hotel_id: HotelId, embedding: Vec<f32>) {
        self.embeddings.write().await.insert(hotel_id, embedding);
    }

    /// Replace the discovery corpus
    pub async fn load_candidates(&self, candidates: Vec<CandidateHotel>) {
        info!("📚 Loaded {} discovery candidates", candidates.len());
        *self.corpus.write().await = candidates;
    }

    pub fn default_discovery_query(&self) -> DiscoveryQuery {
        self.discovery_query
    }

    /// Ghost competitors for the user's target hotel. A missing target or
    /// target embedding yields an empty result.
    pub async fn discover_ghost_competitors(
        &self,
        user_id: UserId,
        query: DiscoveryQuery,
    ) -> Result<Vec<GhostMatch>, DiscoveryError> {
        let Some(target_row) = self
            .get_analysis_with_filters(user_id, &AnalysisFilter::target())
            .await
            .into_iter()
            .next()
        else {
            warn!("⚠️  User {} has no target hotel, nothing to discover", user_id);
            return Ok(Vec::new());
        };
        let Some(target) = self.hotels.get(target_row.hotel_id).await else {
            return Ok(Vec::new());
        };

        let tracked = self.hotels.hotels_for(user_id).await;
        let embeddings = self.embeddings.read().await;
        let corpus = self.corpus.read().await;

        let ranking = match self.discovery.discover(
            &target,
            embeddings.get(&target.id).map(|e| e.as_slice()),
            &corpus,
            &tracked,
            query,
        ) {
            Ok(ranking) => ranking,
            Err(DiscoveryError::EmbeddingUnavailable(name)) => {
                warn!("⚠️  No embedding for {}, returning no ghost competitors", name);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let matches: Vec<GhostMatch> = ranking.iter().collect();
        info!(
            "👻 Found {} ghost competitor(s) for {} out of {} candidates",
            matches.len(),
            target.name,
            ranking.pool_size()
        );
        Ok(matches)
    }
}

#[async_trait]
impl SessionProbe for RateMonitorService {
    async fn refresh(&self, user_id: UserId, session_id: SessionId) -> Option<SessionStatus> {
        self.get_dashboard(user_id).await;
        self.ledger.session(session_id).map(|s| s.status)
    }
}
