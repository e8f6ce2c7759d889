use crate::engine::spec::{AuthConfig, HeaderBag, Invocation};
use crate::engine::template::RequestTemplate;
use crate::engine::RequestEngine;
use crate::errors::ToolError;
use crate::services::access::AccessPolicy;
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use crate::stores::TemplateStore;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::{Map, Value};
use std::sync::Arc;

const REQUEST_ACTIONS: &[&str] = &[
    "send",
    "history",
    "template_get",
    "template_put",
    "template_list",
    "template_delete",
    "template_invocation",
];

#[derive(Clone)]
pub struct RequestManager {
    logger: Logger,
    validation: Validation,
    engine: Arc<RequestEngine>,
    templates: Arc<dyn TemplateStore>,
    access: Arc<dyn AccessPolicy>,
}

impl RequestManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        engine: Arc<RequestEngine>,
        templates: Arc<dyn TemplateStore>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            logger: logger.child("request"),
            validation,
            engine,
            templates,
            access,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let action_name = action.and_then(|v| v.as_str()).unwrap_or("");
        match action_name {
            "send" => self.send(&args).await,
            "history" => self.history(&args).await,
            "template_get" => self.template_get(&args).await,
            "template_put" => self.template_put(&args).await,
            "template_list" => self.template_list(&args).await,
            "template_delete" => self.template_delete(&args).await,
            "template_invocation" => self.template_invocation(&args).await,
            _ => Err(unknown_action_error("probe_request", action, REQUEST_ACTIONS)),
        }
    }

    async fn send(&self, args: &Value) -> Result<Value, ToolError> {
        let actor = self
            .validation
            .ensure_optional_string(args.get("actor"), "actor", true)?;
        let invocation = Invocation::from_value(args).map_err(ToolError::from)?;

        if let (Some(actor), Some(template_id)) = (actor.as_deref(), invocation.api_request_id) {
            if !self.access.may_invoke(actor, template_id).await {
                self.logger.warn(
                    "Invocation denied",
                    Some(&serde_json::json!({
                        "actor": actor,
                        "template_id": template_id.to_string(),
                    })),
                );
                return Err(ToolError::denied(format!(
                    "{} may not invoke request template {}",
                    actor, template_id
                )));
            }
        }

        let execution = self.engine.execute(invocation, actor.as_deref()).await?;
        let mut out = serde_json::to_value(&execution.response)
            .map_err(|err| ToolError::internal(err.to_string()))?;
        if let (Value::Object(map), Some(id)) = (&mut out, execution.record_id) {
            map.insert("history_id".to_string(), Value::String(id.to_string()));
        }
        Ok(out)
    }

    async fn history(&self, args: &Value) -> Result<Value, ToolError> {
        let template_id = self.validation.ensure_uuid(args.get("template_id"), "template_id")?;
        let limit = self.validation.ensure_limit(args.get("limit"))?;
        let records = self.engine.recent_history(template_id, limit).await?;
        Ok(serde_json::json!({
            "template_id": template_id.to_string(),
            "count": records.len(),
            "records": records,
        }))
    }

    async fn template_get(&self, args: &Value) -> Result<Value, ToolError> {
        let template = self.require_template(args).await?;
        serde_json::to_value(template).map_err(|err| ToolError::internal(err.to_string()))
    }

    async fn template_put(&self, args: &Value) -> Result<Value, ToolError> {
        let raw = args
            .get("template")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ToolError::invalid_params("template must be an object"))?;
        let template = parse_template(raw)?;
        let stored = self.templates.put(template).await?;
        self.logger.info(
            "Template saved",
            Some(&serde_json::json!({
                "template_id": stored.id.to_string(),
                "collection_id": stored.collection_id,
            })),
        );
        serde_json::to_value(stored).map_err(|err| ToolError::internal(err.to_string()))
    }

    async fn template_list(&self, args: &Value) -> Result<Value, ToolError> {
        let collection_id =
            self.validation
                .ensure_optional_string(args.get("collection_id"), "collection_id", true)?;
        let templates = self.templates.list(collection_id.as_deref()).await?;
        Ok(serde_json::json!({
            "count": templates.len(),
            "templates": templates,
        }))
    }

    async fn template_delete(&self, args: &Value) -> Result<Value, ToolError> {
        let template_id = self.validation.ensure_uuid(args.get("template_id"), "template_id")?;
        let removed = self.templates.delete(template_id).await?;
        let history_removed = if removed {
            self.engine
                .history_store()
                .delete_for_template(template_id)
                .await?
        } else {
            0
        };
        Ok(serde_json::json!({
            "template_id": template_id.to_string(),
            "deleted": removed,
            "history_removed": history_removed,
        }))
    }

    async fn template_invocation(&self, args: &Value) -> Result<Value, ToolError> {
        let template = self.require_template(args).await?;
        serde_json::to_value(template.to_invocation())
            .map_err(|err| ToolError::internal(err.to_string()))
    }

    async fn require_template(&self, args: &Value) -> Result<RequestTemplate, ToolError> {
        let template_id = self.validation.ensure_uuid(args.get("template_id"), "template_id")?;
        self.templates
            .get(template_id)
            .await?
            .ok_or_else(|| ToolError::not_found(format!("Request template {} not found", template_id)))
    }
}

/// Builds a template from loosely-typed input, assigning an id and
/// timestamps when absent and checking auth and headers the same way the
/// engine will at execution time.
fn parse_template(raw: &Map<String, Value>) -> Result<RequestTemplate, ToolError> {
    let mut fields = raw.clone();
    let now = Value::String(chrono::Utc::now().to_rfc3339());
    if fields.get("id").map(Value::is_null).unwrap_or(true) {
        fields.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
    for key in ["created_at", "updated_at"] {
        if fields.get(key).map(Value::is_null).unwrap_or(true) {
            fields.insert(key.to_string(), now.clone());
        }
    }
    if let Some(Value::String(method)) = fields.get("method") {
        let method: crate::engine::HttpMethod = method.parse()?;
        fields.insert("method".to_string(), Value::String(method.as_str().to_string()));
    }
    let headers = HeaderBag::from_value(fields.get("headers").unwrap_or(&Value::Null))?;
    fields.insert("headers".to_string(), headers.to_value());
    let auth = fields.get("auth").cloned().unwrap_or(Value::Null);
    AuthConfig::from_value(&auth)?;

    serde_json::from_value(Value::Object(fields))
        .map_err(|err| ToolError::invalid_params(format!("Invalid template: {}", err)))
}

#[async_trait::async_trait]
impl ToolHandler for RequestManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_template_fills_identity_and_normalizes_method() {
        let raw = json!({
            "collection_id": "c1",
            "name": "List",
            "url": "https://example.test/items",
            "method": "post",
            "headers": {"X-Retry": 3},
        });
        let template = parse_template(raw.as_object().unwrap()).unwrap();
        assert_eq!(template.method, crate::engine::HttpMethod::Post);
        assert_eq!(template.headers.get("X-Retry"), Some("3"));
        assert_eq!(template.created_at, template.updated_at);
    }

    #[test]
    fn parse_template_rejects_bad_auth_and_methods() {
        let bad_auth = json!({
            "collection_id": "c1", "name": "n", "url": "https://example.test",
            "auth": {"type": "digest"},
        });
        let err = parse_template(bad_auth.as_object().unwrap()).unwrap_err();
        assert_eq!(err.code, "INVALID_PARAMS");

        let bad_method = json!({
            "collection_id": "c1", "name": "n", "url": "https://example.test", "method": "TRACE",
        });
        assert!(parse_template(bad_method.as_object().unwrap()).is_err());
    }
}
