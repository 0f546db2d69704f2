//! Monitoring sweep across a user's hotels

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::{
    ActionType, HotelScope, MonitorResult, QueryLog, QueryStatus, ScanLedger, ScanOptions,
    ScanSession, SessionStatus,
};
use crate::domain::alert::{AlertEngine, AlertLedger, RateSnapshot};
use crate::domain::hotel::{Hotel, HotelRegistry};
use crate::domain::price::{PriceFeed, PriceHistoryStore, RateQuote};
use crate::shared::errors::{FetchError, ScanError};
use crate::shared::types::{HotelId, ScanConfig, SessionId, UserId, UserSettings};

/// Result of checking one hotel
#[derive(Debug)]
enum FetchOutcome {
    Updated { quote: RateQuote },
    Failed { error: String, systemic: bool },
}

/// Marks the session failed if the sweep ends without reaching a
/// terminal state (panic or abort), so no session stays pending.
struct SessionGuard {
    ledger: Arc<ScanLedger>,
    session_id: SessionId,
    armed: bool,
}

impl SessionGuard {
    fn new(ledger: Arc<ScanLedger>, session_id: SessionId) -> Self {
        Self {
            ledger,
            session_id,
            armed: true,
        }
    }

    fn complete(mut self, status: SessionStatus) -> Result<ScanSession, ScanError> {
        self.armed = false;
        self.ledger.finish(self.session_id, status)
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.armed {
            error!("❌ Sweep for session {} ended abnormally", self.session_id);
            let _ = self.ledger.finish(self.session_id, SessionStatus::Failed);
        }
    }
}

/// A started scan: the pending session plus the running sweep
pub struct ScanHandle {
    session: ScanSession,
    task: JoinHandle<Result<MonitorResult, ScanError>>,
}

impl ScanHandle {
    /// The session as created, still pending
    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    /// Wait for the sweep to finish
    pub async fn wait(self) -> Result<MonitorResult, ScanError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ScanError::CollaboratorOutage(format!("sweep task aborted: {}", e))),
        }
    }
}

/// Drives scans: fetch every hotel in scope, record prices, then run the
/// alert engine once over the final state.
#[derive(Clone)]
pub struct ScanOrchestrator {
    hotels: Arc<HotelRegistry>,
    history: Arc<PriceHistoryStore>,
    alerts: Arc<AlertLedger>,
    ledger: Arc<ScanLedger>,
    feed: Arc<dyn PriceFeed>,
    engine: Arc<AlertEngine>,
    config: ScanConfig,
}

impl ScanOrchestrator {
    pub fn new(
        hotels: Arc<HotelRegistry>,
        history: Arc<PriceHistoryStore>,
        alerts: Arc<AlertLedger>,
        ledger: Arc<ScanLedger>,
        feed: Arc<dyn PriceFeed>,
        engine: Arc<AlertEngine>,
        config: ScanConfig,
    ) -> Self {
        Self {
            hotels,
            history,
            alerts,
            ledger,
            feed,
            engine,
            config,
        }
    }

    /// Create a pending session and start the sweep. Fails fast with
    /// `ScanAlreadyInProgress` when the user has a pending session.
    pub async fn start_scan(
        &self,
        user_id: UserId,
        settings: UserSettings,
        options: ScanOptions,
    ) -> Result<ScanHandle, ScanError> {
        let scope = self.resolve_scope(user_id, &options.hotel_scope).await;
        let session = self.ledger.begin(user_id, options.session_type, scope.len())?;
        info!(
            "🔍 Scan {} started for user {} ({:?}, {} hotels)",
            session.id,
            user_id,
            options.session_type,
            scope.len()
        );

        let guard = SessionGuard::new(Arc::clone(&self.ledger), session.id);
        let this = self.clone();
        let sweep_session = session.clone();
        let task = tokio::spawn(async move { this.sweep(sweep_session, scope, settings, guard).await });

        Ok(ScanHandle { session, task })
    }

    /// Start a scan and wait for its result
    pub async fn run_scan(
        &self,
        user_id: UserId,
        settings: UserSettings,
        options: ScanOptions,
    ) -> Result<MonitorResult, ScanError> {
        self.start_scan(user_id, settings, options).await?.wait().await
    }

    async fn resolve_scope(&self, user_id: UserId, scope: &HotelScope) -> Vec<Hotel> {
        let hotels = self.hotels.hotels_for(user_id).await;
        match scope {
            HotelScope::All => hotels,
            HotelScope::Only(ids) => hotels.into_iter().filter(|h| ids.contains(&h.id)).collect(),
        }
    }

    async fn sweep(
        &self,
        session: ScanSession,
        scope: Vec<Hotel>,
        settings: UserSettings,
        guard: SessionGuard,
    ) -> Result<MonitorResult, ScanError> {
        if scope.is_empty() {
            warn!("⚠️  Scan {}: no hotels configured", session.id);
            guard.complete(SessionStatus::Failed)?;
            return Err(ScanError::NoHotelsConfigured(session.user_id));
        }

        let fetch_timeout = self.config.fetch_timeout_ms;
        let mut outcomes: Vec<(usize, FetchOutcome)> = stream::iter(scope.iter().cloned().enumerate())
            .map(|(index, hotel)| {
                let this = self.clone();
                async move { (index, this.check_hotel(&hotel, fetch_timeout).await) }
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;
        // Completion order is arbitrary; merge in scope order
        outcomes.sort_by_key(|(index, _)| *index);

        let mut result = MonitorResult {
            hotels_checked: scope.len(),
            ..MonitorResult::default()
        };
        let mut logs = Vec::with_capacity(scope.len());
        let mut updated: HashSet<HotelId> = HashSet::new();
        let mut systemic_failures = 0usize;
        let vendor = self.feed.vendor().to_string();

        for (index, outcome) in outcomes {
            let hotel = &scope[index];
            let mut log = QueryLog {
                session_id: session.id,
                user_id: session.user_id,
                hotel_id: hotel.id,
                hotel_name: hotel.name.clone(),
                location: hotel.location.clone(),
                action_type: ActionType::PriceCheck,
                status: QueryStatus::Success,
                price: None,
                currency: None,
                vendor: vendor.clone(),
                error: None,
                created_at: Utc::now(),
            };

            match outcome {
                FetchOutcome::Updated { quote } => {
                    result.prices_updated += 1;
                    updated.insert(hotel.id);
                    log.price = Some(quote.price);
                    log.currency = Some(quote.currency);
                    log.vendor = quote.vendor;
                }
                FetchOutcome::Failed { error, systemic } => {
                    warn!("⚠️  {} ({}): {}", hotel.name, hotel.location, error);
                    if systemic {
                        systemic_failures += 1;
                    }
                    result.errors.push(format!("{}: {}", hotel.name, error));
                    log.status = QueryStatus::Failed;
                    log.error = Some(error);
                }
            }
            logs.push(log);
        }
        self.ledger.append_logs(logs);

        let systemic_ratio = systemic_failures as f64 / scope.len() as f64;
        if systemic_failures > 0 && systemic_ratio >= self.config.outage_ratio {
            error!(
                "❌ Scan {} failed: {}/{} fetches hit a source outage",
                session.id,
                systemic_failures,
                scope.len()
            );
            guard.complete(SessionStatus::Failed)?;
            return Err(ScanError::CollaboratorOutage(format!(
                "{} of {} fetches failed",
                systemic_failures,
                scope.len()
            )));
        }

        result.alerts_generated = self.evaluate_alerts(&session, &scope, &updated, &settings).await;

        let finished = guard.complete(SessionStatus::Completed)?;
        info!(
            "✅ Scan {} {:?}: {}/{} prices updated, {} alerts, {} errors",
            finished.id,
            finished.status,
            result.prices_updated,
            result.hotels_checked,
            result.alerts_generated,
            result.errors.len()
        );
        Ok(result)
    }

    async fn check_hotel(&self, hotel: &Hotel, timeout_ms: u64) -> FetchOutcome {
        let _write = self.hotels.lock_hotel(hotel.id).await;
        if self.hotels.get(hotel.id).await.is_none() {
            return FetchOutcome::Failed {
                error: "hotel was removed during the scan".to_string(),
                systemic: false,
            };
        }

        let fetched = match timeout(Duration::from_millis(timeout_ms), self.feed.fetch_rate(hotel)).await {
            Ok(fetched) => fetched,
            Err(_) => Err(FetchError::Timeout(timeout_ms)),
        };
        let quote = match fetched {
            Ok(quote) => quote,
            Err(e) => {
                return FetchOutcome::Failed {
                    systemic: e.is_systemic(),
                    error: e.to_string(),
                }
            }
        };

        match self
            .history
            .record(hotel.id, quote.price, &quote.currency, Utc::now())
            .await
        {
            Ok(_) => FetchOutcome::Updated { quote },
            Err(e) => FetchOutcome::Failed {
                error: e.to_string(),
                systemic: false,
            },
        }
    }

    /// Runs once, after the whole sweep, over the user's current prices
    async fn evaluate_alerts(
        &self,
        session: &ScanSession,
        scope: &[Hotel],
        updated: &HashSet<HotelId>,
        settings: &UserSettings,
    ) -> usize {
        let target = match self.hotels.target_for(session.user_id).await {
            Some(hotel) => self.snapshot(&hotel, updated).await,
            None => None,
        };

        let mut competitors = Vec::new();
        for hotel in scope.iter().filter(|h| !h.is_target_hotel) {
            if let Some(snapshot) = self.snapshot(hotel, updated).await {
                competitors.push(snapshot);
            }
        }

        let existing = self.alerts.for_user(session.user_id, false).await;
        let new_alerts = self
            .engine
            .evaluate(target.as_ref(), &competitors, settings, &existing, Utc::now());
        let count = new_alerts.len();
        self.alerts.append(new_alerts).await;
        count
    }

    async fn snapshot(&self, hotel: &Hotel, updated: &HashSet<HotelId>) -> Option<RateSnapshot> {
        let info = self.history.price_info(hotel.id).await?;
        Some(RateSnapshot {
            user_id: hotel.user_id,
            hotel_name: hotel.name.clone(),
            info,
            refreshed: updated.contains(&hotel.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::AlertType;
    use crate::domain::hotel::NewHotel;
    use crate::infrastructure::feeds::FixturePriceFeed;
    use crate::shared::types::AlertConfig;
    use crate::shared::utils::generate_id;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        orchestrator: ScanOrchestrator,
        hotels: Arc<HotelRegistry>,
        history: Arc<PriceHistoryStore>,
        alerts: Arc<AlertLedger>,
        ledger: Arc<ScanLedger>,
    }

    fn fixture(feed: FixturePriceFeed, config: ScanConfig) -> Fixture {
        let hotels = Arc::new(HotelRegistry::new());
        let history = Arc::new(PriceHistoryStore::new());
        let alerts = Arc::new(AlertLedger::new());
        let ledger = Arc::new(ScanLedger::new());
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(&hotels),
            Arc::clone(&history),
            Arc::clone(&alerts),
            Arc::clone(&ledger),
            Arc::new(feed),
            Arc::new(AlertEngine::new(AlertConfig::default())),
            config,
        );
        Fixture {
            orchestrator,
            hotels,
            history,
            alerts,
            ledger,
        }
    }

    fn settings(threshold: Decimal) -> UserSettings {
        UserSettings {
            threshold_percent: threshold,
            ..UserSettings::default()
        }
    }

    #[tokio::test]
    async fn test_partial_failure_completes() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_script(
                "Rival A",
                "Lisbon",
                vec![Err(FetchError::RateNotFound("Rival A".to_string()))],
            )
            .with_quotes("Rival B", "Lisbon", vec![dec!(120)]);
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();
        fx.hotels.add(user, NewHotel::competitor("Rival A", "Lisbon")).await.unwrap();
        fx.hotels.add(user, NewHotel::competitor("Rival B", "Lisbon")).await.unwrap();

        let handle = fx
            .orchestrator
            .start_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        let session_id = handle.session().id;
        assert_eq!(handle.session().status, SessionStatus::Pending);
        assert_eq!(handle.session().hotels_count, 3);

        let result = handle.wait().await.unwrap();
        assert_eq!(result.hotels_checked, 3);
        assert_eq!(result.prices_updated, 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Rival A"));

        let session = fx.ledger.session(session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());

        let logs = fx.ledger.logs_for(session_id);
        let statuses: Vec<QueryStatus> = logs.iter().map(|l| l.status).collect();
        assert_eq!(
            statuses,
            vec![QueryStatus::Success, QueryStatus::Failed, QueryStatus::Success]
        );
        assert_eq!(logs[2].price, Some(dec!(120)));
    }

    #[tokio::test]
    async fn test_undercut_alert_after_sweep() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_quotes("Rival", "Lisbon", vec![dec!(90)]);
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();
        let rival = fx.hotels.add(user, NewHotel::competitor("Rival", "Lisbon")).await.unwrap();

        let result = fx
            .orchestrator
            .run_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        assert_eq!(result.alerts_generated, 1);

        let alerts = fx.alerts.for_user(user, false).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::CompetitorUndercut);
        assert_eq!(alerts[0].hotel_id, rival.id);

        // Unchanged prices, alert still unread: no duplicate
        let again = fx
            .orchestrator
            .run_scan(user, settings(dec!(10)), ScanOptions::scheduled())
            .await
            .unwrap();
        assert_eq!(again.alerts_generated, 0);
        assert_eq!(fx.alerts.for_user(user, false).await.len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_breach_across_scans() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100), dec!(107.2)]);
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        let home = fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();

        let first = fx
            .orchestrator
            .run_scan(user, settings(dec!(5)), ScanOptions::manual())
            .await
            .unwrap();
        assert_eq!(first.alerts_generated, 0);

        let second = fx
            .orchestrator
            .run_scan(user, settings(dec!(5)), ScanOptions::manual())
            .await
            .unwrap();
        assert_eq!(second.alerts_generated, 1);

        let info = fx.history.price_info(home.id).await.unwrap();
        assert_eq!(info.change_percent, dec!(7.2));
        let alerts = fx.alerts.for_user(user, false).await;
        assert_eq!(alerts[0].alert_type, AlertType::ThresholdBreach);
    }

    #[tokio::test]
    async fn test_no_hotels_fails_session() {
        let fx = fixture(FixturePriceFeed::new("fixture"), ScanConfig::default());
        let user = generate_id();

        let handle = fx
            .orchestrator
            .start_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        let session_id = handle.session().id;
        let result = handle.wait().await;

        assert_eq!(result, Err(ScanError::NoHotelsConfigured(user)));
        assert_eq!(fx.ledger.session(session_id).unwrap().status, SessionStatus::Failed);
        assert!(fx.ledger.pending_for(user).is_none());
    }

    #[tokio::test]
    async fn test_source_outage_fails_session() {
        let outage = || -> Result<Decimal, FetchError> { Err(FetchError::Unavailable("503".to_string())) };
        let feed = FixturePriceFeed::new("fixture")
            .with_script("Home", "Lisbon", vec![outage()])
            .with_script("Rival", "Lisbon", vec![outage()]);
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();
        fx.hotels.add(user, NewHotel::competitor("Rival", "Lisbon")).await.unwrap();

        let handle = fx
            .orchestrator
            .start_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        let session_id = handle.session().id;
        let result = handle.wait().await;

        assert!(matches!(result, Err(ScanError::CollaboratorOutage(_))));
        assert_eq!(fx.ledger.session(session_id).unwrap().status, SessionStatus::Failed);
        // Attempts are still logged for the session detail view
        assert_eq!(fx.ledger.logs_for(session_id).len(), 2);
    }

    #[tokio::test]
    async fn test_second_scan_rejected_while_pending() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_delay(Duration::from_millis(50));
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();

        let first = fx
            .orchestrator
            .start_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        let second = fx
            .orchestrator
            .start_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await;
        assert!(matches!(second, Err(ScanError::ScanAlreadyInProgress(u)) if u == user));
        assert_eq!(fx.ledger.sessions_for(user, 10).len(), 1);

        first.wait().await.unwrap();
        assert!(fx
            .orchestrator
            .run_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_admit_one() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_delay(Duration::from_millis(20));
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = fx.orchestrator.clone();
                tokio::spawn(async move {
                    orchestrator
                        .start_scan(user, settings(dec!(10)), ScanOptions::manual())
                        .await
                })
            })
            .collect();

        let mut handles = Vec::new();
        let mut rejected = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(handle) => handles.push(handle),
                Err(ScanError::ScanAlreadyInProgress(_)) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let admitted = handles.len();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        // Every admitted scan ran alone; later ones may start after earlier finish
        assert!(admitted >= 1);
        assert_eq!(admitted + rejected, 8);
        assert!(fx.ledger.pending_for(user).is_none());
        assert!(fx
            .ledger
            .sessions_for(user, 100)
            .iter()
            .all(|s| s.status == SessionStatus::Completed));
    }

    #[tokio::test]
    async fn test_scoped_scan() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_quotes("Rival", "Lisbon", vec![dec!(95)]);
        let fx = fixture(feed, ScanConfig::default());
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();
        let rival = fx.hotels.add(user, NewHotel::competitor("Rival", "Lisbon")).await.unwrap();

        let result = fx
            .orchestrator
            .run_scan(user, settings(dec!(10)), ScanOptions::manual().with_scope(vec![rival.id]))
            .await
            .unwrap();
        assert_eq!(result.hotels_checked, 1);
        assert_eq!(result.prices_updated, 1);
        // Target never priced, so nothing to undercut
        assert_eq!(result.alerts_generated, 0);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_per_hotel_failure() {
        let feed = FixturePriceFeed::new("fixture")
            .with_quotes("Home", "Lisbon", vec![dec!(100)])
            .with_delay(Duration::from_millis(200));
        let config = ScanConfig {
            fetch_timeout_ms: 10,
            outage_ratio: 2.0,
            ..ScanConfig::default()
        };
        let fx = fixture(feed, config);
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();

        let result = fx
            .orchestrator
            .run_scan(user, settings(dec!(10)), ScanOptions::manual())
            .await
            .unwrap();
        assert_eq!(result.prices_updated, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("timed out"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_sweep_on_worker_threads() {
        let mut feed = FixturePriceFeed::new("fixture").with_quotes("Home", "Lisbon", vec![dec!(100)]);
        for i in 0..6 {
            feed = feed.with_quotes(&format!("Rival {}", i), "Lisbon", vec![dec!(90)]);
        }
        let config = ScanConfig {
            max_concurrent_fetches: 3,
            ..ScanConfig::default()
        };
        let fx = fixture(feed, config);
        let user = generate_id();
        fx.hotels.add(user, NewHotel::target("Home", "Lisbon")).await.unwrap();
        for i in 0..6 {
            fx.hotels
                .add(user, NewHotel::competitor(&format!("Rival {}", i), "Lisbon"))
                .await
                .unwrap();
        }

        // The scan itself is spawned onto another worker
        let orchestrator = fx.orchestrator.clone();
        let result = tokio::spawn(async move {
            orchestrator
                .run_scan(user, settings(dec!(10)), ScanOptions::manual())
                .await
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.hotels_checked, 7);
        assert_eq!(result.prices_updated, 7);
        assert_eq!(result.alerts_generated, 6);
    }
}
