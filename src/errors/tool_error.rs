use crate::errors::{EngineError, ErrorKind};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    Denied,
    NotFound,
    Timeout,
    Retryable,
    Internal,
}

impl ToolErrorKind {
    fn code(self) -> &'static str {
        match self {
            ToolErrorKind::InvalidParams => "INVALID_PARAMS",
            ToolErrorKind::Denied => "DENIED",
            ToolErrorKind::NotFound => "NOT_FOUND",
            ToolErrorKind::Timeout => "TIMEOUT",
            ToolErrorKind::Retryable => "RETRYABLE",
            ToolErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Failure of a tool action. Engine failures keep their
/// `{error, kind, status}` payload in `details`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
    #[serde(skip)]
    from_engine: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, ToolErrorKind::Timeout | ToolErrorKind::Retryable),
            from_engine: false,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Denied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }

    /// The engine's boundary payload when this error came from a request
    /// execution, `None` for tool-level failures.
    pub fn engine_payload(&self) -> Option<&Value> {
        if self.from_engine {
            self.details.as_ref()
        } else {
            None
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<EngineError> for ToolError {
    fn from(err: EngineError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Validation => ToolErrorKind::InvalidParams,
            ErrorKind::Transport if err.is_timeout() => ToolErrorKind::Timeout,
            ErrorKind::Transport => ToolErrorKind::Retryable,
            ErrorKind::Persistence | ErrorKind::Internal => ToolErrorKind::Internal,
        };
        let mut out = ToolError::new(kind, err.to_string()).with_details(err.to_value());
        out.from_engine = true;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_failures_keep_their_boundary_payload() {
        let err = ToolError::from(EngineError::Transport {
            message: "HTTP request timed out".to_string(),
            timed_out: true,
            source: None,
        });
        assert_eq!(err.code, "TIMEOUT");
        assert!(err.retryable);
        let payload = err.engine_payload().expect("payload");
        assert_eq!(payload["kind"], "transport");
        assert_eq!(payload["status"], 502);
    }

    #[test]
    fn tool_level_details_are_not_engine_payloads() {
        let err = ToolError::invalid_params("bad").with_details(serde_json::json!({"kind": "x"}));
        assert!(err.engine_payload().is_none());
        assert!(!err.retryable);
    }
}
