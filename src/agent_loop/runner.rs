//! Session loop: drives one agent session to completion.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bon::Builder;

use crate::config::ConductorConfig;
use crate::conversation::TurnLog;
use crate::error::ConductorError;
use crate::provider::{ModelProvider, OpenAiCompatibleProvider};
use crate::tools::ToolExecutor;

use super::budget::CostGovernor;
use super::events::SessionEventSink;
use super::registry::{RegistrationGuard, SessionRegistry};
use super::session::{Session, SessionMonitor, SessionResource};
use super::types::{SessionIdentity, SessionOutcome};

mod control;
mod engine;
mod limits;
mod tooling;

pub use engine::{IterationError, IterationStep};

use control::{debug_enabled, SessionEventEmitter};
use limits::RunnerLimits;

/// Request payload to start a session.
#[derive(Builder)]
pub struct SessionRequest {
    #[builder(into)]
    pub agent_name: String,
    /// Agent id; a v4 uuid is generated when absent.
    #[builder(into)]
    pub agent_id: Option<String>,
    /// Account charged for model spend.
    #[builder(into, default = String::from("default"))]
    pub user_id: String,
    #[builder(into, default = PathBuf::from("."))]
    pub workspace: PathBuf,
    /// Per-run overrides such as `runner.max_iterations`.
    #[builder(default)]
    pub metadata: HashMap<String, String>,
    pub event_sink: Option<SessionEventSink>,
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("agent_name", &self.agent_name)
            .field("agent_id", &self.agent_id)
            .field("user_id", &self.user_id)
            .field("workspace", &self.workspace)
            .field("metadata", &self.metadata)
            .field("event_sink", &self.event_sink.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A registered session that has not started running yet.
///
/// Dropping it deregisters the identity.
pub struct ActiveSession {
    session: Session,
    guard: RegistrationGuard,
    metadata: HashMap<String, String>,
    event_sink: Option<SessionEventSink>,
}

impl ActiveSession {
    pub fn identity(&self) -> &SessionIdentity {
        self.guard.identity()
    }

    /// Idle monitor for outside supervisors; stays valid after the run.
    pub fn monitor(&self) -> SessionMonitor {
        self.session.monitor()
    }

    /// Attach a resource released when the session exits.
    pub fn add_resource(&mut self, resource: Box<dyn SessionResource>) {
        self.session.add_resource(resource);
    }
}

/// Drives sessions against a model provider and a tool executor.
///
/// The session registry and cost governor are shared services; clone the
/// `Arc`s into every loop that should see the same sessions and spend.
#[derive(Clone)]
pub struct SessionLoop {
    config: ConductorConfig,
    provider: Arc<dyn ModelProvider>,
    tools: Arc<dyn ToolExecutor>,
    registry: Arc<SessionRegistry>,
    budget: Arc<CostGovernor>,
}

impl SessionLoop {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: Arc<dyn ToolExecutor>) -> Self {
        let config = ConductorConfig::default();
        Self {
            budget: Arc::new(CostGovernor::from_config(&config.budget)),
            config,
            provider,
            tools,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Build the default OpenAI-compatible provider and budget from `config`.
    pub fn from_config(
        config: ConductorConfig,
        tools: Arc<dyn ToolExecutor>,
    ) -> Result<Self, ConductorError> {
        let provider = Arc::new(OpenAiCompatibleProvider::from_config(&config.provider)?);
        Ok(Self {
            budget: Arc::new(CostGovernor::from_config(&config.budget)),
            config,
            provider,
            tools,
            registry: Arc::new(SessionRegistry::new()),
        })
    }

    /// Replace the config. The cost governor is left as is.
    pub fn with_config(mut self, config: ConductorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_budget(mut self, budget: Arc<CostGovernor>) -> Self {
        self.budget = budget;
        self
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn budget(&self) -> &Arc<CostGovernor> {
        &self.budget
    }

    /// Register the session identity.
    ///
    /// Fails with [`ConductorError::DuplicateSession`] when the identity is live.
    pub fn open(&self, request: SessionRequest) -> Result<ActiveSession, ConductorError> {
        let SessionRequest {
            agent_name,
            agent_id,
            user_id,
            workspace,
            metadata,
            event_sink,
        } = request;
        let identity = match agent_id {
            Some(id) => SessionIdentity::new(agent_name, id),
            None => SessionIdentity::generate(agent_name),
        };
        let guard = self
            .registry
            .acquire(&identity)
            .ok_or_else(|| ConductorError::DuplicateSession(identity.to_string()))?;
        let session = Session::new(
            identity,
            user_id,
            workspace,
            self.config.session.idle_timeout(),
        );
        Ok(ActiveSession {
            session,
            guard,
            metadata,
            event_sink,
        })
    }

    /// Run an opened session until it exits.
    pub async fn drive<L>(&self, active: ActiveSession, log: &mut L) -> SessionOutcome
    where
        L: TurnLog + Send + ?Sized,
    {
        let ActiveSession {
            mut session,
            guard,
            metadata,
            event_sink,
        } = active;
        let limits = RunnerLimits::from_metadata(&metadata, &self.config);
        if debug_enabled() {
            tracing::debug!(
                session = %session.identity(),
                max_iterations = limits.max_iterations,
                no_tool_call_limit = limits.no_tool_call_limit,
                parallel_tools = limits.parallel_tools,
                allow_multiple_calls = limits.allow_multiple_calls,
                "session limits"
            );
        }
        let emitter = SessionEventEmitter::new(session.identity().clone(), event_sink);
        let outcome = engine::run_session(self, &mut session, log, limits, &emitter).await;
        engine::finalize(session, guard, &emitter, outcome).await
    }

    /// Open and drive a session.
    ///
    /// The only error is a duplicate identity; every other failure ends the
    /// session with a final message in the outcome.
    pub async fn run<L>(
        &self,
        request: SessionRequest,
        log: &mut L,
    ) -> Result<SessionOutcome, ConductorError>
    where
        L: TurnLog + Send + ?Sized,
    {
        let active = self.open(request)?;
        Ok(self.drive(active, log).await)
    }
}

#[cfg(test)]
mod tests;
