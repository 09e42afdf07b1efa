//! Process-wide spend tracking and budget checks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::config::BudgetConfig;
use crate::types::{Cost, ModelPricing, Usage};

/// Final response for a session stopped by a budget.
pub const COST_LIMIT_MESSAGE: &str = "Execution limit reached, reply to continue.";

/// Which ceiling was hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetScope {
    Total,
    User(String),
}

impl std::fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Total => f.write_str("total"),
            Self::User(user) => write!(f, "user {user}"),
        }
    }
}

/// Raised when spend has reached a budget. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cost limit reached ({scope}): spent {spent_micros} of {limit_micros} micro-USD")]
pub struct CostLimitExceeded {
    pub scope: BudgetScope,
    pub spent_micros: u64,
    pub limit_micros: u64,
}

/// Spend counters shared by all sessions.
///
/// Spend is kept in integer micro-dollars; every update is a single
/// `fetch_add`.
#[derive(Debug)]
pub struct CostGovernor {
    pricing: ModelPricing,
    total_limit_micros: Option<u64>,
    per_user_limit_micros: Option<u64>,
    total_spent: AtomicU64,
    per_user: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl Default for CostGovernor {
    fn default() -> Self {
        Self::unlimited()
    }
}

fn usd_to_micros(usd: f64) -> u64 {
    (usd * 1_000_000.0).round().max(0.0) as u64
}

impl CostGovernor {
    pub fn new(pricing: ModelPricing, total_usd: Option<f64>, per_user_usd: Option<f64>) -> Self {
        Self {
            pricing,
            total_limit_micros: total_usd.map(usd_to_micros),
            per_user_limit_micros: per_user_usd.map(usd_to_micros),
            total_spent: AtomicU64::new(0),
            per_user: Mutex::new(HashMap::new()),
        }
    }

    /// Governor that tracks spend but never refuses.
    pub fn unlimited() -> Self {
        Self::new(ModelPricing::default(), None, None)
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(config.pricing, config.total_usd, config.per_user_usd)
    }

    fn user_counter(&self, user_id: &str) -> Arc<AtomicU64> {
        let mut per_user = self
            .per_user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            per_user
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AtomicU64::new(0))),
        )
    }

    /// Charge the cost of `usage` to `user_id`; returns the micro-dollars charged.
    pub fn record_usage(&self, user_id: &str, usage: &Usage) -> u64 {
        let micros = Cost::from_usage(usage, &self.pricing).total_micros();
        self.record_spend_micros(user_id, micros);
        micros
    }

    pub fn record_spend_micros(&self, user_id: &str, micros: u64) {
        if micros == 0 {
            return;
        }
        let total = self.total_spent.fetch_add(micros, Ordering::SeqCst) + micros;
        let user = self.user_counter(user_id).fetch_add(micros, Ordering::SeqCst) + micros;
        debug!(user_id, micros, total, user, "spend recorded");
    }

    /// Fail once spend has reached (or passed) either ceiling.
    pub fn check_total_cost_limit(&self, user_id: &str) -> Result<(), CostLimitExceeded> {
        if let Some(limit) = self.total_limit_micros {
            let spent = self.total_spent.load(Ordering::SeqCst);
            if spent >= limit {
                return Err(CostLimitExceeded {
                    scope: BudgetScope::Total,
                    spent_micros: spent,
                    limit_micros: limit,
                });
            }
        }
        if let Some(limit) = self.per_user_limit_micros {
            let spent = self.user_spent_micros(user_id);
            if spent >= limit {
                return Err(CostLimitExceeded {
                    scope: BudgetScope::User(user_id.to_string()),
                    spent_micros: spent,
                    limit_micros: limit,
                });
            }
        }
        Ok(())
    }

    pub fn total_spent_micros(&self) -> u64 {
        self.total_spent.load(Ordering::SeqCst)
    }

    pub fn user_spent_micros(&self, user_id: &str) -> u64 {
        self.per_user
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(user_id)
            .map(|counter| counter.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}
