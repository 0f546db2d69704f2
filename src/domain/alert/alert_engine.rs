//! Alert evaluation over a consistent price snapshot

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{Alert, AlertType, RateSnapshot, Severity};
use crate::domain::price::{Trend, TrendCalculator};
use crate::shared::types::{AlertConfig, HotelId, UserSettings};
use crate::shared::utils::{generate_id, round_percent};

/// Evaluates price state against user thresholds. Returns new alerts
/// only; persisting them is the caller's job.
pub struct AlertEngine {
    config: AlertConfig,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Run both rules once. `existing` holds the user's previously emitted
    /// alerts and drives deduplication.
    pub fn evaluate(
        &self,
        target: Option<&RateSnapshot>,
        competitors: &[RateSnapshot],
        settings: &UserSettings,
        existing: &[Alert],
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let mut emitted: HashSet<(HotelId, AlertType)> = HashSet::new();
        let mut alerts = Vec::new();

        if let Some(target) = target {
            for competitor in competitors {
                if let Some(alert) = self.check_undercut(target, competitor, now) {
                    self.push_unless_suppressed(alert, existing, &mut emitted, &mut alerts, now);
                }
            }
        }

        for snapshot in target.into_iter().chain(competitors.iter()) {
            if let Some(alert) = self.check_threshold(snapshot, settings, now) {
                self.push_unless_suppressed(alert, existing, &mut emitted, &mut alerts, now);
            }
        }

        if !alerts.is_empty() {
            info!("🚨 Alert engine emitted {} alert(s)", alerts.len());
        }
        alerts
    }

    /// `(target - competitor) / target * 100`; `None` when either price is
    /// unknown or not positive.
    pub fn undercut_percent(target_price: Decimal, competitor_price: Decimal) -> Option<Decimal> {
        if target_price <= Decimal::ZERO || competitor_price <= Decimal::ZERO {
            return None;
        }
        target_price
            .checked_sub(competitor_price)
            .and_then(|gap| gap.checked_div(target_price))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
    }

    pub fn undercut_severity(&self, undercut_percent: Decimal) -> Severity {
        if undercut_percent > self.config.undercut_high_severity_percent {
            Severity::High
        } else {
            Severity::Low
        }
    }

    fn check_undercut(
        &self,
        target: &RateSnapshot,
        competitor: &RateSnapshot,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let target_price = target.info.current_price;
        let competitor_price = competitor.info.current_price;
        let undercut = Self::undercut_percent(target_price, competitor_price)?;
        if undercut <= Decimal::ZERO {
            return None;
        }

        Some(Alert {
            id: generate_id(),
            user_id: competitor.user_id,
            hotel_id: competitor.info.hotel_id,
            alert_type: AlertType::CompetitorUndercut,
            severity: self.undercut_severity(undercut),
            message: format!(
                "{} undercuts your rate by {}% ({} vs {} {})",
                competitor.hotel_name,
                round_percent(undercut),
                competitor_price,
                target_price,
                target.info.currency
            ),
            old_price: Some(target_price),
            new_price: competitor_price,
            is_read: false,
            created_at: now,
        })
    }

    fn check_threshold(
        &self,
        snapshot: &RateSnapshot,
        settings: &UserSettings,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if !snapshot.refreshed {
            return None;
        }
        let change = snapshot.info.change_percent;
        if !TrendCalculator::is_significant_change(change, settings.threshold_percent) {
            return None;
        }

        let doubled = settings.threshold_percent.checked_mul(Decimal::TWO);
        let severity = if doubled.is_some_and(|cap| change.abs() > cap) {
            Severity::High
        } else {
            Severity::Low
        };
        let direction = match snapshot.info.trend {
            Trend::Up => "rose",
            Trend::Down => "dropped",
            Trend::Stable => "moved",
        };

        Some(Alert {
            id: generate_id(),
            user_id: snapshot.user_id,
            hotel_id: snapshot.info.hotel_id,
            alert_type: AlertType::ThresholdBreach,
            severity,
            message: format!(
                "{} {} {}% ({} -> {} {})",
                snapshot.hotel_name,
                direction,
                round_percent(change.abs()),
                snapshot
                    .info
                    .previous_price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                snapshot.info.current_price,
                snapshot.info.currency
            ),
            old_price: snapshot.info.previous_price,
            new_price: snapshot.info.current_price,
            is_read: false,
            created_at: now,
        })
    }

    /// An unread alert for the same pair, or one created within the
    /// re-arm cooldown, suppresses a new one. A cooldown past the end of
    /// representable time never re-arms.
    fn is_suppressed(&self, alert: &Alert, existing: &[Alert], now: DateTime<Utc>) -> bool {
        let cooldown = Duration::try_minutes(self.config.rearm_cooldown_minutes.max(0));
        existing
            .iter()
            .filter(|a| a.hotel_id == alert.hotel_id && a.alert_type == alert.alert_type)
            .any(|a| {
                !a.is_read
                    || cooldown
                        .and_then(|c| a.created_at.checked_add_signed(c))
                        .map_or(true, |rearm_at| now < rearm_at)
            })
    }

    fn push_unless_suppressed(
        &self,
        alert: Alert,
        existing: &[Alert],
        emitted: &mut HashSet<(HotelId, AlertType)>,
        alerts: &mut Vec<Alert>,
        now: DateTime<Utc>,
    ) {
        let key = (alert.hotel_id, alert.alert_type);
        if emitted.contains(&key) || self.is_suppressed(&alert, existing, now) {
            debug!(
                "Suppressed duplicate {} alert for hotel {}",
                alert.alert_type.as_str(),
                alert.hotel_id
            );
            return;
        }
        emitted.insert(key);
        alerts.push(alert);
    }
}
