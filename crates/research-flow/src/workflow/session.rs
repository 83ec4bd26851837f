//! Session-level surface over the orchestrator
//!
//! Tracks in-flight runs by session id so they can be cancelled and
//! observed while they execute. A session's handle is dropped as soon as its
//! run returns.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::research::state::{ProgressSnapshot, WorkItem};

use super::executor::Orchestrator;

struct SessionHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<ProgressSnapshot>,
}

/// Removes a session handle when the run finishes or its future is dropped
struct SessionGuard<'a> {
    sessions: &'a DashMap<String, SessionHandle>,
    session_id: &'a str,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.sessions.remove(self.session_id);
        debug!(session_id = %self.session_id, "Session handle released");
    }
}

/// Runs research sessions and exposes cancellation and progress
#[derive(Clone)]
pub struct ResearchService {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<DashMap<String, SessionHandle>>,
}

impl ResearchService {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self::from_shared(Arc::new(orchestrator))
    }

    pub fn from_shared(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Generate a fresh session id
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run one research session to completion.
    ///
    /// Fails only if a run with the same session id is already in flight;
    /// everything that goes wrong during the run is reported on the
    /// returned work item.
    pub async fn run(
        &self,
        session_id: impl Into<String>,
        query: impl Into<String>,
        user_profile: Value,
        prompt_config: Value,
    ) -> Result<WorkItem, OrchestratorError> {
        let session_id = session_id.into();
        let initial = WorkItem::new(session_id.clone(), query, user_profile, prompt_config);
        let (tx, rx) = watch::channel(initial.progress());
        let cancel = CancellationToken::new();

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => return Err(OrchestratorError::SessionActive(session_id)),
            Entry::Vacant(slot) => {
                slot.insert(SessionHandle {
                    cancel: cancel.clone(),
                    progress: rx,
                });
            }
        }
        let _guard = SessionGuard {
            sessions: &self.sessions,
            session_id: &session_id,
        };

        let result = self.orchestrator.drive(initial, &cancel, Some(&tx)).await;
        info!(
            session_id = %session_id,
            outcome = ?result.outcome(),
            iterations = result.iteration_count(),
            "Session finished"
        );
        Ok(result)
    }

    /// Request cancellation of an in-flight session.
    ///
    /// Returns false when no such session is running.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(handle) => {
                info!(session_id = %session_id, "Cancelling session");
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Latest bookkeeping snapshot of an in-flight session
    pub fn progress(&self, session_id: &str) -> Option<ProgressSnapshot> {
        self.sessions
            .get(session_id)
            .map(|handle| handle.progress.borrow().clone())
    }

    /// Subscribe to progress updates of an in-flight session
    pub fn subscribe(&self, session_id: &str) -> Option<watch::Receiver<ProgressSnapshot>> {
        self.sessions
            .get(session_id)
            .map(|handle| handle.progress.clone())
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}
