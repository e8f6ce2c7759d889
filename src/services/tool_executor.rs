use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;

use serde_json::Value;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

/// Routes tool calls to their handlers and logs each call with its
/// duration and redacted arguments.
#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let Some(handler) = self.handlers.get(tool).cloned() else {
            let known = self.tool_names();
            return Err(ToolError::invalid_params(format!("Unknown tool: {}", tool))
                .with_hint(format!("Use one of: {}.", known.join(", "))));
        };

        let started = std::time::Instant::now();
        let action = args
            .get("action")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        self.logger.debug(
            "Tool call",
            Some(&serde_json::json!({
                "tool": tool,
                "args": redact_object(&args, 2048, None),
            })),
        );

        let result = handler.handle(args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => self.logger.info(
                "Tool call completed",
                Some(&serde_json::json!({
                    "tool": tool,
                    "action": action,
                    "duration_ms": duration_ms,
                })),
            ),
            Err(err) => self.logger.warn(
                "Tool call failed",
                Some(&failure_meta(tool, action.as_deref(), duration_ms, err)),
            ),
        }
        result
    }
}

fn failure_meta(tool: &str, action: Option<&str>, duration_ms: u64, err: &ToolError) -> Value {
    serde_json::json!({
        "tool": tool,
        "action": action,
        "duration_ms": duration_ms,
        "code": err.code,
        "error": err.message,
    })
}
