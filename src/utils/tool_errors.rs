use crate::errors::ToolError;
use serde_json::Value;

pub fn unknown_action_error(
    tool: &str,
    action: Option<&Value>,
    known_actions: &[&str],
) -> ToolError {
    let action_value = action.and_then(|v| v.as_str()).unwrap_or_default();
    let mut err = ToolError::invalid_params(format!("Unknown {} action: {}", tool, action_value));
    if !known_actions.is_empty() {
        err = err
            .with_hint(format!("Use one of: {}.", known_actions.join(", ")))
            .with_details(serde_json::json!({ "known_actions": known_actions }));
    }
    err
}
