//! Agent session loop primitives (sessions, events, budgets, retries).

pub mod budget;
pub mod events;
pub mod registry;
pub mod resume;
pub mod retry;
pub mod runner;
pub mod session;
pub mod types;

pub use budget::{BudgetScope, CostGovernor, CostLimitExceeded, COST_LIMIT_MESSAGE};
pub use events::*;
pub use registry::{RegistrationGuard, SessionRegistry};
pub use resume::{ResumeDecision, ResumeKind};
pub use retry::{RetryDecision, RetryGovernor, RetryPolicy};
pub use runner::*;
pub use session::{Session, SessionMonitor, SessionResource};
pub use types::*;
