use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError};
use crate::mcp::catalog::{tool_by_name, tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn text_content(value: &Value, is_error: bool) -> Value {
    serde_json::json!({
        "content": [ { "type": "text", "text": serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string()) } ],
        "isError": is_error,
    })
}

pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub async fn new() -> Result<Self, ToolError> {
        let app = App::initialize()?;
        Ok(Self { app: Arc::new(app) })
    }

    pub fn with_app(app: Arc<App>) -> Self {
        Self { app }
    }

    async fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"list": true, "call": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    async fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": tool_catalog() })
    }

    /// Failed requests come back as a tool result flagged `isError` with the
    /// engine's `{error, kind, status}` payload; everything else that fails
    /// is a JSON-RPC error.
    pub async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        if tool_by_name(name).is_none() {
            return Err(McpError::new(
                ErrorCode::InvalidParams,
                format!("Unknown tool: {}", name),
            ));
        }
        validate_tool_args(name, &args)?;

        match self.app.tool_executor.execute(name, args).await {
            Ok(result) => Ok(text_content(&result, false)),
            Err(err) => match err.engine_payload() {
                Some(payload) => Ok(text_content(payload, true)),
                None => Err(McpError::from_tool_error(name, &err)),
            },
        }
    }

    async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let Ok(parsed) = serde_json::from_str::<Value>(line) else {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                McpError::new(ErrorCode::ParseError, "Parse error"),
            ));
        };
        let Ok(request) = serde_json::from_value::<JsonRpcRequest>(parsed) else {
            return Some(JsonRpcResponse::failure(
                Value::Null,
                McpError::new(ErrorCode::InvalidRequest, "Invalid request"),
            ));
        };
        if request.is_notification() {
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize().await),
            "tools/list" => Ok(self.handle_tools_list().await),
            "tools/call" => {
                let (name, args) = request.tool_call();
                if name.is_empty() {
                    Err(McpError::new(ErrorCode::InvalidParams, "Missing tool name"))
                } else {
                    self.handle_tools_call(name, args).await
                }
            }
            _ => Err(McpError::new(ErrorCode::MethodNotFound, "Method not found")),
        };
        let id = request.id.unwrap_or(Value::Null);
        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    /// Serves line-delimited JSON-RPC until the reader hits EOF.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = BufWriter::new(writer);
        while let Some(line) = lines.next_line().await? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(trimmed).await {
                let payload = serde_json::to_string(&response)
                    .map_err(|err| ToolError::internal(err.to_string()))?;
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        self.app.logger.info("Listening on stdio", None);
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = McpServer::new().await?;
    server.run_stdio().await
}
