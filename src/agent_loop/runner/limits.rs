use std::collections::HashMap;
use std::time::Duration;

use crate::config::ConductorConfig;

const RUNNER_MAX_ITERATIONS_KEYS: [&str; 2] = ["runner.max_iterations", "max_iterations"];
const RUNNER_NO_TOOL_CALL_LIMIT_KEYS: [&str; 2] =
    ["runner.no_tool_call_limit", "no_tool_call_limit"];
const RUNNER_PARALLEL_TOOLS_KEYS: [&str; 2] = ["runner.parallel_tools", "parallel_tools"];
const RUNNER_ALLOW_MULTIPLE_CALLS_KEYS: [&str; 2] = [
    "runner.allow_multiple_tool_calls",
    "allow_multiple_tool_calls",
];
const RUNNER_TOOL_BATCH_TIMEOUT_KEYS: [&str; 2] =
    ["runner.tool_batch_timeout_ms", "tool_batch_timeout_ms"];

/// Limits for one session: config values with request metadata on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RunnerLimits {
    pub(super) max_iterations: usize,
    pub(super) no_tool_call_limit: usize,
    pub(super) parallel_tools: bool,
    pub(super) allow_multiple_calls: bool,
    pub(super) batch_timeout: Option<Duration>,
}

impl RunnerLimits {
    pub(super) fn from_metadata(
        metadata: &HashMap<String, String>,
        config: &ConductorConfig,
    ) -> Self {
        Self {
            max_iterations: lookup(metadata, &RUNNER_MAX_ITERATIONS_KEYS, parse_positive_usize)
                .unwrap_or(config.limits.max_iterations),
            no_tool_call_limit: lookup(
                metadata,
                &RUNNER_NO_TOOL_CALL_LIMIT_KEYS,
                parse_positive_usize,
            )
            .unwrap_or(config.limits.no_tool_call_limit.max(1)),
            parallel_tools: lookup(metadata, &RUNNER_PARALLEL_TOOLS_KEYS, parse_bool)
                .unwrap_or(config.tools.parallel),
            allow_multiple_calls: lookup(metadata, &RUNNER_ALLOW_MULTIPLE_CALLS_KEYS, parse_bool)
                .unwrap_or(config.tools.allow_multiple_calls),
            batch_timeout: lookup(metadata, &RUNNER_TOOL_BATCH_TIMEOUT_KEYS, parse_positive_usize)
                .map(|ms| Duration::from_millis(ms as u64))
                .or_else(|| config.tools.batch_timeout()),
        }
    }
}

fn lookup<T>(
    metadata: &HashMap<String, String>,
    keys: &[&str],
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| parse(value))
}

fn parse_positive_usize(value: &str) -> Option<usize> {
    let parsed = value.trim().parse::<usize>().ok()?;
    if parsed == 0 {
        None
    } else {
        Some(parsed)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_overrides_config() {
        let config = ConductorConfig::default();
        let metadata = HashMap::from([
            ("runner.max_iterations".to_string(), "7".to_string()),
            ("parallel_tools".to_string(), "yes".to_string()),
            ("runner.tool_batch_timeout_ms".to_string(), "250".to_string()),
        ]);
        let limits = RunnerLimits::from_metadata(&metadata, &config);
        assert_eq!(limits.max_iterations, 7);
        assert!(limits.parallel_tools);
        assert!(!limits.allow_multiple_calls);
        assert_eq!(limits.batch_timeout, Some(Duration::from_millis(250)));
        assert_eq!(limits.no_tool_call_limit, 3);
    }

    #[test]
    fn invalid_metadata_falls_back_to_config() {
        let mut config = ConductorConfig::default();
        config.limits.max_iterations = 11;
        let metadata = HashMap::from([
            ("runner.max_iterations".to_string(), "0".to_string()),
            ("max_iterations".to_string(), "many".to_string()),
        ]);
        assert_eq!(
            RunnerLimits::from_metadata(&metadata, &config).max_iterations,
            11
        );
    }
}
