//! Scan sessions and their query logs

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::warn;

use super::{QueryLog, ScanSession, SessionStatus, SessionType};
use crate::shared::errors::ScanError;
use crate::shared::types::{SessionId, UserId};
use crate::shared::utils::generate_id;

#[derive(Default)]
struct LedgerState {
    sessions: Vec<ScanSession>,
    logs: Vec<QueryLog>,
    revision: u64,
}

/// Owns `ScanSession` and `QueryLog` records. Enforces at most one
/// pending session per user. Critical sections never await, so a plain
/// mutex is used and terminal transitions can run from `Drop`.
pub struct ScanLedger {
    state: Mutex<LedgerState>,
}

impl ScanLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a pending session, failing fast if the user already has one
    pub fn begin(
        &self,
        user_id: UserId,
        session_type: SessionType,
        hotels_count: usize,
    ) -> Result<ScanSession, ScanError> {
        let mut state = self.state();
        if state
            .sessions
            .iter()
            .any(|s| s.user_id == user_id && s.status == SessionStatus::Pending)
        {
            return Err(ScanError::ScanAlreadyInProgress(user_id));
        }

        let session = ScanSession {
            id: generate_id(),
            user_id,
            session_type,
            status: SessionStatus::Pending,
            hotels_count,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.sessions.push(session.clone());
        state.revision += 1;
        Ok(session)
    }

    /// Move a pending session to a terminal status. A session that is
    /// already terminal is returned unchanged.
    pub fn finish(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<ScanSession, ScanError> {
        let mut state = self.state();
        let session = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(ScanError::SessionNotFound(session_id))?;

        if session.status.is_terminal() {
            warn!(
                "Session {} is already {:?}, ignoring transition to {:?}",
                session_id, session.status, status
            );
            return Ok(session.clone());
        }
        if !status.is_terminal() {
            return Ok(session.clone());
        }

        session.status = status;
        session.completed_at = Some(Utc::now());
        let finished = session.clone();
        state.revision += 1;
        Ok(finished)
    }

    pub fn append_logs(&self, logs: Vec<QueryLog>) {
        if logs.is_empty() {
            return;
        }
        let mut state = self.state();
        state.logs.extend(logs);
        state.revision += 1;
    }

    pub fn session(&self, session_id: SessionId) -> Option<ScanSession> {
        self.state().sessions.iter().find(|s| s.id == session_id).cloned()
    }

    /// Query logs of one session in the order they were written
    pub fn logs_for(&self, session_id: SessionId) -> Vec<QueryLog> {
        self.state()
            .logs
            .iter()
            .filter(|l| l.session_id == session_id)
            .cloned()
            .collect()
    }

    /// Newest first
    pub fn sessions_for(&self, user_id: UserId, limit: usize) -> Vec<ScanSession> {
        self.state()
            .sessions
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Newest first, across sessions
    pub fn recent_logs_for(&self, user_id: UserId, limit: usize) -> Vec<QueryLog> {
        self.state()
            .logs
            .iter()
            .rev()
            .filter(|l| l.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn pending_for(&self, user_id: UserId) -> Option<ScanSession> {
        self.state()
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.status == SessionStatus::Pending)
            .cloned()
    }

    pub fn latest_for(&self, user_id: UserId) -> Option<ScanSession> {
        self.state()
            .sessions
            .iter()
            .rev()
            .find(|s| s.user_id == user_id)
            .cloned()
    }

    /// Bumped on every write; lets read projections detect staleness
    pub fn revision(&self) -> u64 {
        self.state().revision
    }
}

impl Default for ScanLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_pending_per_user() {
        let ledger = ScanLedger::new();
        let user = generate_id();

        let session = ledger.begin(user, SessionType::Manual, 3).unwrap();
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.hotels_count, 3);

        assert_eq!(
            ledger.begin(user, SessionType::Scheduled, 3),
            Err(ScanError::ScanAlreadyInProgress(user))
        );
        // Another user is unaffected
        assert!(ledger.begin(generate_id(), SessionType::Manual, 1).is_ok());

        ledger.finish(session.id, SessionStatus::Completed).unwrap();
        assert!(ledger.begin(user, SessionType::Manual, 3).is_ok());
    }

    #[test]
    fn test_terminal_is_final() {
        let ledger = ScanLedger::new();
        let session = ledger.begin(generate_id(), SessionType::Manual, 1).unwrap();

        let done = ledger.finish(session.id, SessionStatus::Completed).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(done.completed_at.is_some());

        let again = ledger.finish(session.id, SessionStatus::Failed).unwrap();
        assert_eq!(again.status, SessionStatus::Completed);
        assert_eq!(again.completed_at, done.completed_at);

        let unknown = generate_id();
        assert_eq!(
            ledger.finish(unknown, SessionStatus::Failed),
            Err(ScanError::SessionNotFound(unknown))
        );
    }

    #[test]
    fn test_concurrent_begin_admits_one() {
        let ledger = Arc::new(ScanLedger::new());
        let user = generate_id();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.begin(user, SessionType::Manual, 1).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(admitted, 1);
        assert!(ledger.pending_for(user).is_some());
        assert_eq!(ledger.sessions_for(user, 100).len(), 1);
    }

    #[test]
    fn test_revision_moves_on_writes() {
        let ledger = ScanLedger::new();
        let before = ledger.revision();
        let session = ledger.begin(generate_id(), SessionType::Manual, 0).unwrap();
        assert!(ledger.revision() > before);

        let mid = ledger.revision();
        ledger.finish(session.id, SessionStatus::Failed).unwrap();
        assert!(ledger.revision() > mid);
    }
}
