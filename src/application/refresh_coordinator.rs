//! Polling watcher for in-flight scans

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::scan::SessionStatus;
use crate::shared::types::{RefreshConfig, SessionId, UserId};

/// Read side the coordinator polls. Must not mutate core state.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    /// Refetch session and dashboard state; `None` if the session is unknown
    async fn refresh(&self, user_id: UserId, session_id: SessionId) -> Option<SessionStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Polling {
        session_id: SessionId,
        started_at: Instant,
        deadline: Instant,
    },
}

struct Poller {
    generation: u64,
    session_id: SessionId,
    started_at: Instant,
    deadline: Instant,
    task: JoinHandle<()>,
}

type Pollers = Arc<Mutex<HashMap<UserId, Poller>>>;

fn lock(pollers: &Pollers) -> MutexGuard<'_, HashMap<UserId, Poller>> {
    pollers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One poller per user. Starting a new one cancels the previous, so two
/// pollers never overlap for the same user.
pub struct RefreshCoordinator {
    probe: Arc<dyn SessionProbe>,
    poll_interval: Duration,
    timeout: Duration,
    pollers: Pollers,
    next_generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(probe: Arc<dyn SessionProbe>, config: &RefreshConfig) -> Self {
        Self {
            probe,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            timeout: Duration::from_millis(config.timeout_ms),
            pollers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// idle -> polling for `session_id`. Replaces any poller the user had.
    pub fn start_polling(&self, user_id: UserId, session_id: SessionId) -> RefreshState {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let started_at = Instant::now();
        let deadline = started_at + self.timeout;

        // Held across spawn so the task cannot clear its entry before it exists
        let mut pollers = lock(&self.pollers);
        if let Some(previous) = pollers.remove(&user_id) {
            debug!(
                "Replacing poller for user {} (session {})",
                user_id, previous.session_id
            );
            previous.task.abort();
        }

        let task = tokio::spawn(poll_session(
            Arc::clone(&self.probe),
            Arc::clone(&self.pollers),
            user_id,
            session_id,
            generation,
            self.poll_interval,
            deadline,
        ));
        pollers.insert(
            user_id,
            Poller {
                generation,
                session_id,
                started_at,
                deadline,
                task,
            },
        );
        info!("🔄 Polling session {} for user {}", session_id, user_id);

        RefreshState::Polling {
            session_id,
            started_at,
            deadline,
        }
    }

    /// Force polling -> idle. Returns whether a poller was running.
    pub fn stop_polling(&self, user_id: UserId) -> bool {
        match lock(&self.pollers).remove(&user_id) {
            Some(poller) => {
                poller.task.abort();
                debug!("Stopped poller for user {}", user_id);
                true
            }
            None => false,
        }
    }

    /// An external observation that `session_id` reached a terminal state.
    /// Stops the user's poller if it watches that session.
    pub fn observe_terminal(&self, user_id: UserId, session_id: SessionId) -> bool {
        let mut pollers = lock(&self.pollers);
        let watching = pollers
            .get(&user_id)
            .is_some_and(|poller| poller.session_id == session_id);
        if !watching {
            return false;
        }
        if let Some(poller) = pollers.remove(&user_id) {
            poller.task.abort();
        }
        true
    }

    pub fn state(&self, user_id: UserId) -> RefreshState {
        match lock(&self.pollers).get(&user_id) {
            Some(poller) if !poller.task.is_finished() => RefreshState::Polling {
                session_id: poller.session_id,
                started_at: poller.started_at,
                deadline: poller.deadline,
            },
            _ => RefreshState::Idle,
        }
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        for (_, poller) in lock(&self.pollers).drain() {
            poller.task.abort();
        }
    }
}

async fn poll_session(
    probe: Arc<dyn SessionProbe>,
    pollers: Pollers,
    user_id: UserId,
    session_id: SessionId,
    generation: u64,
    poll_interval: Duration,
    deadline: Instant,
) {
    let mut ticker = interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                warn!("⏰ Polling session {} timed out", session_id);
                break;
            }
            _ = ticker.tick() => {
                match probe.refresh(user_id, session_id).await {
                    Some(status) if status.is_terminal() => {
                        info!("✅ Session {} finished as {:?}", session_id, status);
                        break;
                    }
                    Some(_) => {}
                    None => {
                        warn!("⚠️  Session {} is unknown, stopping poller", session_id);
                        break;
                    }
                }
            }
        }
    }

    let mut pollers = lock(&pollers);
    if pollers.get(&user_id).map(|p| p.generation) == Some(generation) {
        pollers.remove(&user_id);
    }
}
