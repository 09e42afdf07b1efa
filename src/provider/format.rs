//! Rendering turns into chat-completions wire messages.

use serde_json::{json, Value};

use crate::types::Turn;

/// Render one turn as a wire message.
pub fn turn_to_wire(turn: &Turn) -> Value {
    match turn {
        Turn::System { content } => json!({ "role": "system", "content": content }),
        Turn::User { content, .. } => json!({ "role": "user", "content": content }),
        Turn::Assistant {
            content,
            tool_calls,
            ..
        } => {
            let mut message = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments,
                            }
                        })
                    })
                    .collect();
                message["tool_calls"] = Value::Array(calls);
            }
            message
        }
        Turn::Tool {
            tool_call_id,
            content,
            ..
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

/// Render the whole log, oldest first.
pub fn turns_to_wire(turns: &[Turn]) -> Vec<Value> {
    turns.iter().map(turn_to_wire).collect()
}
