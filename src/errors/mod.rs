mod engine_error;
mod mcp_error;
mod tool_error;

pub use engine_error::{EngineError, ErrorKind};
pub use mcp_error::{ErrorCode, McpError};
pub use tool_error::{ToolError, ToolErrorKind};
