use crate::errors::{ToolError, ToolErrorKind};
use serde::Serialize;
use std::fmt;

/// JSON-RPC 2.0 error codes, plus the MCP timeout extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(i32)]
pub enum ErrorCode {
    RequestTimeout = -32001,
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub code: ErrorCode,
    pub message: String,
}

impl McpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Renders a tool failure as a multi-line protocol error.
    pub fn from_tool_error(tool: &str, error: &ToolError) -> Self {
        let mut lines = vec![
            format!("tool: {}", tool),
            format!("code: {}", error.code),
            format!("retryable: {}", error.retryable),
            format!("message: {}", error.message),
        ];
        if let Some(hint) = &error.hint {
            lines.push(format!("hint: {}", hint));
        }
        let code = match error.kind {
            ToolErrorKind::InvalidParams => ErrorCode::InvalidParams,
            ToolErrorKind::Timeout => ErrorCode::RequestTimeout,
            ToolErrorKind::Denied | ToolErrorKind::NotFound => ErrorCode::InvalidRequest,
            ToolErrorKind::Retryable | ToolErrorKind::Internal => ErrorCode::InternalError,
        };
        Self::new(code, lines.join("\n"))
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for McpError {}
