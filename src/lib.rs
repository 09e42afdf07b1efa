//! Conductor: agent orchestration core.
//!
//! Drives a single conversational agent session to completion by alternating
//! between model completions and the tool calls they request, with retries,
//! cost limits, resume handling for interrupted sessions, and bounded-parallel
//! tool execution.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use conductor::prelude::*;
//! use conductor::tools::builtin::control_tools;
//!
//! # async fn example() -> conductor::error::Result<()> {
//! let config = ConductorConfig::load()?;
//! let mut tools = ToolRegistry::new();
//! for tool in control_tools() {
//!     tools.register(tool);
//! }
//! let runner = SessionLoop::from_config(config, Arc::new(tools))?;
//!
//! let mut log = InMemoryTurnLog::new();
//! log.append(Turn::user("Summarize the README"));
//! let outcome = runner
//!     .run(SessionRequest::builder().agent_name("writer").build(), &mut log)
//!     .await?;
//! println!("{}: {}", outcome.state, outcome.response);
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
