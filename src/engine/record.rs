use crate::engine::dispatch::PreparedRequest;
use crate::engine::normalize::{elapsed_ms, NormalizedResponse};
use crate::engine::spec::AuthConfig;
use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Immutable snapshot of one invocation: what was sent and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub template_id: Uuid,
    pub url: String,
    pub method: String,
    /// Resolved request headers. With basic auth the transport replaces any
    /// `Authorization` listed here, so that entry was not sent as recorded.
    pub headers: BTreeMap<String, String>,
    pub params: Map<String, Value>,
    pub body: Value,
    pub auth: Value,
    pub response_status: Option<u16>,
    pub response_headers: Option<BTreeMap<String, String>>,
    pub response_body: Option<Value>,
    pub response_time: f64,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub executed_by: Option<String>,
}

impl ExecutionRecord {
    /// Captures the request as sent and either the normalized response or
    /// the transport failure. `executed_at` is stamped here.
    pub fn capture(
        template_id: Uuid,
        prepared: &PreparedRequest,
        auth: &AuthConfig,
        outcome: Result<&NormalizedResponse, &EngineError>,
        elapsed: Duration,
        actor: Option<&str>,
    ) -> Self {
        let spec = &prepared.spec;
        let (response_status, response_headers, response_body, response_time, error) =
            match outcome {
                Ok(response) => (
                    Some(response.status_code),
                    Some(response.headers.clone()),
                    Some(response.body.clone()),
                    response.time,
                    None,
                ),
                Err(err) => (None, None, None, elapsed_ms(elapsed), Some(err.to_string())),
            };
        Self {
            id: Uuid::new_v4(),
            template_id,
            url: spec.url.clone(),
            method: spec.method.as_str().to_string(),
            headers: spec
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            params: spec.params.clone(),
            body: spec.body.clone(),
            auth: auth.to_value(),
            response_status,
            response_headers,
            response_body,
            response_time,
            error,
            executed_at: Utc::now(),
            executed_by: actor.map(|a| a.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatch::prepare;
    use crate::engine::spec::{HttpMethod, RequestSpec};

    #[test]
    fn transport_failures_capture_the_sent_request_and_the_error() {
        let spec = RequestSpec::new("https://example.test/items", HttpMethod::Post)
            .with_header("Authorization", "Bearer t");
        let prepared = prepare(spec, Duration::from_secs(30)).unwrap();
        let auth = AuthConfig::Bearer {
            token: "t".to_string(),
        };
        let err = EngineError::Transport {
            message: "Connection failed: refused".to_string(),
            timed_out: false,
            source: None,
        };
        let template_id = Uuid::new_v4();
        let record = ExecutionRecord::capture(
            template_id,
            &prepared,
            &auth,
            Err(&err),
            Duration::from_millis(4),
            Some("carol"),
        );
        assert_eq!(record.template_id, template_id);
        assert_eq!(record.method, "POST");
        assert_eq!(record.body, serde_json::json!({}));
        assert_eq!(record.auth["type"], "bearer");
        assert_eq!(record.response_status, None);
        assert_eq!(record.response_headers, None);
        assert_eq!(record.error.as_deref(), Some("Connection failed: refused"));
        assert!((record.response_time - 4.0).abs() < 1e-9);
        assert_eq!(record.executed_by.as_deref(), Some("carol"));
    }
}
