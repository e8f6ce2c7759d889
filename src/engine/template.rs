use crate::constants::network::DEFAULT_TIMEOUT_MS;
use crate::engine::spec::{HeaderBag, HttpMethod, Invocation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

fn default_method() -> HttpMethod {
    HttpMethod::Get
}

/// Saved, reusable request definition owned by a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    pub id: Uuid,
    pub collection_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HeaderBag,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub auth: Value,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestTemplate {
    pub fn new(collection_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection_id: collection_id.into(),
            name: name.into(),
            description: None,
            url: url.into(),
            method: HttpMethod::Get,
            headers: HeaderBag::new(),
            params: Map::new(),
            body: Value::Null,
            auth: Value::Null,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            verify_ssl: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Pre-populates an invocation from the stored fields. The invocation is
    /// an independent copy and may be edited freely before execution.
    pub fn to_invocation(&self) -> Invocation {
        Invocation {
            url: self.url.clone(),
            method: self.method.as_str().to_string(),
            headers: self.headers.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            auth: self.auth.clone(),
            timeout: self.timeout_ms,
            follow_redirects: self.follow_redirects,
            verify_ssl: self.verify_ssl,
            api_request_id: Some(self.id),
        }
    }
}
