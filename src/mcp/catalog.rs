use crate::errors::{ErrorCode, McpError};
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn probe_request_tool() -> ToolDef {
    ToolDef {
        name: "probe_request".to_string(),
        description: "Execute HTTP requests with auth injection and default headers, \
                      record execution history, and manage saved request templates."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": [
                        "send",
                        "history",
                        "template_get",
                        "template_put",
                        "template_list",
                        "template_delete",
                        "template_invocation"
                    ]
                },
                "url": {"type": "string"},
                "method": {"type": "string"},
                "headers": {"type": ["object", "null"]},
                "params": {"type": ["object", "null"]},
                "body": {},
                "auth": {"type": ["object", "null"]},
                "timeout": {"type": ["integer", "null"], "minimum": 0},
                "follow_redirects": {"type": ["boolean", "null"]},
                "verify_ssl": {"type": ["boolean", "null"]},
                "api_request_id": {"type": ["string", "null"]},
                "actor": {"type": ["string", "null"]},
                "template_id": {"type": "string"},
                "collection_id": {"type": ["string", "null"]},
                "limit": {"type": ["integer", "null"], "minimum": 1},
                "template": {"type": "object"}
            },
            "required": ["action"],
            "additionalProperties": false
        }),
    }
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| vec![probe_request_tool()]);

static TOOL_MAP: Lazy<HashMap<String, ToolDef>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .cloned()
        .map(|tool| (tool.name.clone(), tool))
        .collect()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_MAP.get(name)
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let action = args.get("action").and_then(|v| v.as_str());
        let header = match action {
            Some(action) => format!("Invalid arguments for {}:{}", tool_name, action),
            None => format!("Invalid arguments for {}", tool_name),
        };
        let rendered: Vec<String> = errors
            .take(10)
            .map(|err| {
                let path = err.instance_path.to_string();
                let path = if path.is_empty() { "(root)".to_string() } else { path };
                format!("{}: {}", path, err)
            })
            .collect();
        return Err(McpError::new(
            ErrorCode::InvalidParams,
            format!("{}\n{}", header, rendered.join("\n")),
        ));
    }
    Ok(())
}
