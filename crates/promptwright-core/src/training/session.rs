//! Live training sessions.
//!
//! `SessionRegistry` maps session ids to the in-memory state of sessions
//! that are currently in training. Idle sessions have no entry. Each entry
//! sits behind its own async mutex so turns of one session run one at a
//! time while distinct sessions proceed independently.
//!
//! Handles are cloned out of the `DashMap` immediately; no map guard is ever
//! held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use promptwright_types::training::{SessionId, SessionState, TrainingMode, UserId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Shared handle to one live session.
pub type SessionHandle = Arc<Mutex<SessionState>>;

/// Registry of sessions currently in training.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionHandle>,
    idle_timeout: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: chrono::Duration::from_std(idle_timeout)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Handle for `session_id`, if it is in training.
    pub fn get(&self, session_id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|r| r.value().clone())
    }

    /// Put `session_id` into training with an empty conversation.
    ///
    /// Replaces any previous entry for the same id.
    pub fn start(&self, session_id: SessionId, user_id: UserId) -> SessionHandle {
        let handle = Arc::new(Mutex::new(SessionState::training(user_id)));
        self.sessions.insert(session_id, handle.clone());
        handle
    }

    /// Drop the entry for `session_id`. Returns whether one existed.
    ///
    /// Callers holding the session lock should set its mode to `Idle` first
    /// so turns queued on the same handle see the exit.
    pub fn end(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Whether `state` has been inactive for longer than the idle timeout.
    pub fn is_expired(&self, state: &SessionState) -> bool {
        Utc::now().signed_duration_since(state.last_activity) > self.idle_timeout
    }

    /// Remove every idle-expired session that is not currently handling a turn.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|session_id, handle| match handle.try_lock() {
            Ok(mut state) => {
                if self.is_expired(&state) {
                    state.mode = TrainingMode::Idle;
                    debug!(session_id = %session_id, "Evicting idle training session");
                    false
                } else {
                    true
                }
            }
            Err(_) => true,
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Periodically evict idle sessions until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle();
                if evicted > 0 {
                    info!(evicted, remaining = registry.len(), "Evicted idle training sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
