//! Parsing and typed access for tool call arguments.

use crate::error::ConductorError;

/// Wrapper around parsed tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

/// Arguments parsed from a raw payload, plus the diagnostic when parsing fell back.
#[derive(Debug, Clone)]
pub struct ParsedArguments {
    pub arguments: ToolArguments,
    pub parse_error: Option<String>,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Empty object arguments.
    pub fn empty() -> Self {
        Self::new(serde_json::json!({}))
    }

    /// Parse a raw argument payload.
    ///
    /// A blank payload is an empty object. A payload that is not valid JSON also
    /// becomes an empty object so the tool can report its own, more specific
    /// validation error; the parse diagnostic is returned alongside.
    pub fn parse(raw: &str) -> ParsedArguments {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return ParsedArguments {
                arguments: Self::empty(),
                parse_error: None,
            };
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value @ serde_json::Value::Object(_)) => ParsedArguments {
                arguments: Self::new(value),
                parse_error: None,
            },
            Ok(other) => ParsedArguments {
                arguments: Self::empty(),
                parse_error: Some(format!(
                    "expected a JSON object for arguments, got {}",
                    json_kind(&other)
                )),
            },
            Err(err) => ParsedArguments {
                arguments: Self::empty(),
                parse_error: Some(format!("arguments are not valid JSON: {err}")),
            },
        }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, ConductorError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ConductorError::InvalidArgument(format!("Missing string argument: {key}"))
            })
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, ConductorError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                ConductorError::InvalidArgument(format!("Missing integer argument: {key}"))
            })
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, ConductorError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            ConductorError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
