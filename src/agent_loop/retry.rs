//! Iteration retry with exponential backoff.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ConductorError;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of consecutive failed attempts.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Cap on delay accumulated over the whole session.
    pub max_total_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_total_wait: Duration::from_millis(config.max_total_wait_ms),
        }
    }

    /// `min(base * 2^(attempt - 1), max_delay)` for 1-based `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// What to do after a failed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32, message: String },
}

/// Per-session retry state.
#[derive(Debug, Clone)]
pub struct RetryGovernor {
    policy: RetryPolicy,
    attempts: u32,
    total_wait: Duration,
}

impl RetryGovernor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            total_wait: Duration::ZERO,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Consecutive failed attempts since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff accumulated over the session.
    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    /// Reset the consecutive-attempt counter. Accumulated wait is kept.
    pub fn record_success(&mut self) {
        self.attempts = 0;
    }

    /// Count one failed attempt and decide whether to try again.
    pub fn on_failure(&mut self, error: &ConductorError) -> RetryDecision {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts >= self.policy.max_attempts {
            return RetryDecision::GiveUp {
                attempts: self.attempts,
                message: exhausted_message(self.attempts, error),
            };
        }
        if self.total_wait >= self.policy.max_total_wait {
            return RetryDecision::GiveUp {
                attempts: self.attempts,
                message: format!(
                    "Stopped retrying after waiting {}s in total. Last error: {error}",
                    self.total_wait.as_secs()
                ),
            };
        }
        let delay = self.policy.delay_for_attempt(self.attempts);
        self.total_wait += delay;
        RetryDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }
}

fn exhausted_message(attempts: u32, error: &ConductorError) -> String {
    if error.is_network_class() {
        format!(
            "Stopped after {attempts} failed attempts: the connection kept failing ({error}). \
             Try asking for shorter output or splitting the work into smaller steps."
        )
    } else {
        format!("Stopped after {attempts} failed attempts. Last error: {error}")
    }
}

/// Text recorded in the log for a failed attempt.
pub fn failure_notice(error: &ConductorError) -> String {
    if error.is_network_class() {
        format!(
            "The previous step was interrupted by a connection problem ({error}). \
             Keep responses and tool arguments short; split large outputs into several \
             smaller tool calls."
        )
    } else {
        format!("The previous step failed: {error}. Review the error and try again.")
    }
}

/// Text recorded for a pending tool call that was interrupted by a failure.
pub fn interrupted_call_notice(tool_name: &str, error: &ConductorError) -> String {
    format!(
        "The call to `{tool_name}` did not complete. {}",
        failure_notice(error)
    )
}
