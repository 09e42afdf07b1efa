use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use super::super::events::{AgentEvent, SessionEvent, SessionEventSink};
use super::super::types::SessionIdentity;

pub(super) fn debug_enabled() -> bool {
    matches!(std::env::var("CONDUCTOR_DEBUG").as_deref(), Ok("1"))
}

/// Stamps events with the session identity and a sequence number.
pub(super) struct SessionEventEmitter {
    session: SessionIdentity,
    seq: AtomicU64,
    sink: Option<SessionEventSink>,
}

impl SessionEventEmitter {
    pub(super) fn new(session: SessionIdentity, sink: Option<SessionEventSink>) -> Self {
        Self {
            session,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    /// Deliver `event`. Listener errors and panics are logged and dropped.
    pub(super) fn emit(&self, event: AgentEvent) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let envelope = SessionEvent {
            session: self.session.clone(),
            seq,
            timestamp: chrono::Utc::now(),
            event,
        };
        match catch_unwind(AssertUnwindSafe(|| (sink)(envelope))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(session = %self.session, seq, error = %err, "event listener failed");
            }
            Err(_) => warn!(session = %self.session, seq, "event listener panicked"),
        }
    }
}
