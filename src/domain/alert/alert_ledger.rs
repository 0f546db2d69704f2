//! Persisted alerts. Never deleted; only `is_read` is mutable.

use tokio::sync::RwLock;
use tracing::info;

use super::Alert;
use crate::shared::errors::AlertError;
use crate::shared::types::{AlertId, UserId};

pub struct AlertLedger {
    alerts: RwLock<Vec<Alert>>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
        }
    }

    pub async fn append(&self, new_alerts: Vec<Alert>) {
        if new_alerts.is_empty() {
            return;
        }
        let mut alerts = self.alerts.write().await;
        alerts.extend(new_alerts);
    }

    /// Alerts of a user, newest first
    pub async fn for_user(&self, user_id: UserId, unread_only: bool) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id && (!unread_only || !a.is_read))
            .cloned()
            .collect()
    }

    pub async fn unread_count(&self, user_id: UserId) -> usize {
        let alerts = self.alerts.read().await;
        alerts
            .iter()
            .filter(|a| a.user_id == user_id && !a.is_read)
            .count()
    }

    /// User acknowledgment, the only permitted mutation
    pub async fn mark_read(&self, alert_id: AlertId) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or(AlertError::NotFound(alert_id))?;
        alert.is_read = true;
        Ok(alert.clone())
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> usize {
        let mut alerts = self.alerts.write().await;
        let mut marked = 0;
        for alert in alerts.iter_mut().filter(|a| a.user_id == user_id && !a.is_read) {
            alert.is_read = true;
            marked += 1;
        }
        if marked > 0 {
            info!("✅ Marked {} alert(s) read for user {}", marked, user_id);
        }
        marked
    }
}

impl Default for AlertLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertType, Severity};
    use crate::shared::utils::generate_id;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn alert(user_id: UserId) -> Alert {
        Alert {
            id: generate_id(),
            user_id,
            hotel_id: generate_id(),
            alert_type: AlertType::CompetitorUndercut,
            severity: Severity::Low,
            message: "Rival undercuts your rate".to_string(),
            old_price: Some(dec!(100)),
            new_price: dec!(97),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_read() {
        let ledger = AlertLedger::new();
        let user = generate_id();
        let first = alert(user);
        let second = alert(user);
        ledger.append(vec![first.clone(), second.clone()]).await;
        assert_eq!(ledger.unread_count(user).await, 2);

        let marked = ledger.mark_read(first.id).await.unwrap();
        assert!(marked.is_read);
        assert_eq!(marked.message, first.message);
        assert_eq!(ledger.unread_count(user).await, 1);

        let unread = ledger.for_user(user, true).await;
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, second.id);

        // Nothing is deleted
        assert_eq!(ledger.for_user(user, false).await.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_unknown_alert() {
        let ledger = AlertLedger::new();
        let id = generate_id();
        assert_eq!(ledger.mark_read(id).await, Err(AlertError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_mark_all_read_scoped_to_user() {
        let ledger = AlertLedger::new();
        let user = generate_id();
        let other = generate_id();
        ledger.append(vec![alert(user), alert(user), alert(other)]).await;

        assert_eq!(ledger.mark_all_read(user).await, 2);
        assert_eq!(ledger.unread_count(user).await, 0);
        assert_eq!(ledger.unread_count(other).await, 1);
    }
}
