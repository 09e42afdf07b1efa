//! Registry of live session identities.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::types::SessionIdentity;

/// Set of identities of running sessions, shared by every session loop.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    live: Mutex<HashSet<SessionIdentity>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashSet<SessionIdentity>> {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `identity`; returns `false` if it is already live.
    pub fn register(&self, identity: &SessionIdentity) -> bool {
        let inserted = self.live().insert(identity.clone());
        debug!(session = %identity, inserted, "session register");
        inserted
    }

    /// Remove `identity`. Removing an unknown identity is a no-op.
    pub fn deregister(&self, identity: &SessionIdentity) {
        if self.live().remove(identity) {
            debug!(session = %identity, "session deregister");
        }
    }

    pub fn is_registered(&self, identity: &SessionIdentity) -> bool {
        self.live().contains(identity)
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live().is_empty()
    }

    /// Register and return a guard that deregisters on drop.
    pub fn acquire(self: &Arc<Self>, identity: &SessionIdentity) -> Option<RegistrationGuard> {
        self.register(identity).then(|| RegistrationGuard {
            registry: Arc::clone(self),
            identity: identity.clone(),
        })
    }
}

/// Keeps an identity registered until dropped.
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    identity: SessionIdentity,
}

impl RegistrationGuard {
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.identity);
    }
}
