//! Per-session state owned by one session loop.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ConductorError;

use super::types::{AgentState, SessionIdentity};

/// Something a session holds open and must release when it exits.
#[async_trait]
pub trait SessionResource: Send + Sync {
    fn name(&self) -> &str;

    async fn release(&self) -> Result<(), ConductorError>;
}

/// Read-only view of a session's activity for outside supervisors.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    last_activity: Arc<Mutex<Instant>>,
    idle_timeout: Duration,
}

impl SessionMonitor {
    pub fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// No activity for at least the idle timeout.
    pub fn is_idle(&self) -> bool {
        self.idle_for() >= self.idle_timeout
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

/// Mutable state of one running session.
pub struct Session {
    identity: SessionIdentity,
    user_id: String,
    workspace: PathBuf,
    state: AgentState,
    iteration: usize,
    last_activity: Arc<Mutex<Instant>>,
    idle_timeout: Duration,
    retry_wait: Duration,
    resources: Vec<Box<dyn SessionResource>>,
}

impl Session {
    pub fn new(
        identity: SessionIdentity,
        user_id: impl Into<String>,
        workspace: impl Into<PathBuf>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            user_id: user_id.into(),
            workspace: workspace.into(),
            state: AgentState::Idle,
            iteration: 0,
            last_activity: Arc::new(Mutex::new(Instant::now())),
            idle_timeout,
            retry_wait: Duration::ZERO,
            resources: Vec::new(),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn retry_wait(&self) -> Duration {
        self.retry_wait
    }

    pub fn monitor(&self) -> SessionMonitor {
        SessionMonitor {
            last_activity: Arc::clone(&self.last_activity),
            idle_timeout: self.idle_timeout,
        }
    }

    pub(crate) fn transition(&mut self, next: AgentState) -> Result<(), ConductorError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.touch();
        self.iteration
    }

    pub(crate) fn add_retry_wait(&mut self, wait: Duration) {
        self.retry_wait += wait;
    }

    pub(crate) fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    pub fn add_resource(&mut self, resource: Box<dyn SessionResource>) {
        self.resources.push(resource);
    }

    /// Release every resource. Failures are logged, never returned.
    ///
    /// Returns the number of resources that failed to release.
    pub(crate) async fn release_resources(&mut self) -> usize {
        let mut failures = 0;
        for resource in self.resources.drain(..) {
            if let Err(err) = resource.release().await {
                failures += 1;
                warn!(
                    session = %self.identity,
                    resource = resource.name(),
                    error = %err,
                    "failed to release session resource"
                );
            }
        }
        failures
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("user_id", &self.user_id)
            .field("workspace", &self.workspace)
            .field("state", &self.state)
            .field("iteration", &self.iteration)
            .field("resources", &self.resources.len())
            .finish()
    }
}
