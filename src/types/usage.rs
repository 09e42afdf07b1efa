//! Token usage and cost tracking types.

use serde::{Deserialize, Serialize};

/// Token usage for a model call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Per-token pricing for a model, in USD per million tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Estimated cost for a model call.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Cost {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl Cost {
    /// Compute cost from usage and per-token pricing.
    pub fn from_usage(usage: &Usage, pricing: &ModelPricing) -> Self {
        let input_cost = (usage.input_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
        let output_cost = (usage.output_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
        Self {
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }

    /// Total cost in integer micro-dollars.
    pub fn total_micros(&self) -> u64 {
        (self.total_cost * 1_000_000.0).round().max(0.0) as u64
    }
}
