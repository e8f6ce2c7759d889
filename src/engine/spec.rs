use crate::constants::network::DEFAULT_TIMEOUT_MS;
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// POST, PUT and PATCH send a JSON payload; the rest never carry a body.
    pub fn sends_payload(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| EngineError::InvalidMethod(raw.trim().to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Auth configuration attached to a request, tagged by `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        #[serde(default)]
        username: String,
        #[serde(default)]
        password: String,
    },
    Bearer {
        #[serde(default)]
        token: String,
    },
    #[serde(rename = "apikey")]
    ApiKey {
        #[serde(default)]
        key: String,
        #[serde(default)]
        value: String,
        #[serde(default)]
        location: ApiKeyLocation,
    },
}

impl AuthConfig {
    /// Parses a loosely-typed auth payload. Null, `{}` and objects without a
    /// `type` mean "no auth"; anything else must be a well-formed variant.
    pub fn from_value(raw: &Value) -> Result<Self, EngineError> {
        match raw {
            Value::Null => Ok(AuthConfig::None),
            Value::Object(map) if map.is_empty() || !map.contains_key("type") => {
                Ok(AuthConfig::None)
            }
            Value::Object(map) => {
                if map.get("type").map(Value::is_null).unwrap_or(false) {
                    return Ok(AuthConfig::None);
                }
                serde_json::from_value(raw.clone())
                    .map_err(|err| EngineError::validation(format!("Invalid auth config: {}", err)))
            }
            _ => Err(EngineError::validation(
                "Invalid auth config: expected an object with a type field",
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            AuthConfig::None => "none",
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ApiKey { .. } => "apikey",
        }
    }

    /// Credential values that must never reach diagnostic output.
    pub fn secret_values(&self) -> Vec<String> {
        let values = match self {
            AuthConfig::None => vec![],
            AuthConfig::Basic { password, .. } => vec![password.clone()],
            AuthConfig::Bearer { token } => vec![token.clone()],
            AuthConfig::ApiKey { value, .. } => vec![value.clone()],
        };
        values.into_iter().filter(|v| !v.is_empty()).collect()
    }
}

/// Username/password pair applied through the HTTP client's basic-auth slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Header map that keeps the caller's key casing but compares keys
/// case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderBag(BTreeMap<String, String>);

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header map from JSON. Non-string scalars are rendered as JSON
    /// text and nulls are dropped.
    pub fn from_value(raw: &Value) -> Result<Self, EngineError> {
        let mut bag = HeaderBag::new();
        match raw {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    match value {
                        Value::Null => {}
                        Value::String(text) => bag = bag.with(key, text),
                        Value::Array(_) | Value::Object(_) => {
                            return Err(EngineError::validation(format!(
                                "Header '{}' must be a string",
                                key
                            )))
                        }
                        other => bag = bag.with(key, &other.to_string()),
                    }
                }
            }
            _ => return Err(EngineError::validation("headers must be an object")),
        }
        Ok(bag)
    }

    pub fn find(&self, name: &str) -> Option<(&str, &str)> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Sets `name`, replacing any existing key that differs only in case.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.0.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    /// Sets `name` only when no key with that name exists.
    pub fn with_default(self, name: &str, value: &str) -> Self {
        if self.contains(name) {
            self
        } else {
            self.with(name, value)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Immutable description of one outbound request. Each pipeline stage takes
/// a spec by value and hands back a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HeaderBag,
    pub params: Map<String, Value>,
    pub body: Value,
    pub credentials: Option<Credentials>,
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub verify_ssl: bool,
}

impl RequestSpec {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderBag::new(),
            params: Map::new(),
            body: Value::Null,
            credentials: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            verify_ssl: true,
        }
    }

    pub fn with_header(self, name: &str, value: &str) -> Self {
        Self {
            headers: self.headers.with(name, value),
            ..self
        }
    }

    pub fn with_headers(self, headers: HeaderBag) -> Self {
        Self { headers, ..self }
    }

    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn with_params(self, params: Map<String, Value>) -> Self {
        Self { params, ..self }
    }

    pub fn with_body(self, body: Value) -> Self {
        Self { body, ..self }
    }

    pub fn with_credentials(self, credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..self
        }
    }

    /// Diagnostic view of the request; the logger redacts it before output.
    pub fn describe(&self) -> Value {
        serde_json::json!({
            "method": self.method.as_str(),
            "url": self.url,
            "headers": self.headers.to_value(),
            "params": Value::Object(self.params.clone()),
            "has_body": !self.body.is_null(),
            "basic_auth": self.credentials.as_ref().map(|c| c.username.clone()),
            "timeout_ms": self.timeout_ms,
            "follow_redirects": self.follow_redirects,
            "verify_ssl": self.verify_ssl,
        })
    }
}

/// Case-insensitive presence check consulted by every "caller intent wins" rule.
pub fn header_present(spec: &RequestSpec, name: &str) -> bool {
    spec.headers.contains(name)
}

fn default_method() -> String {
    HttpMethod::Get.as_str().to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

/// Self-contained payload accepted at the engine boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: HeaderBag,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub auth: Value,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_request_id: Option<Uuid>,
}

impl Invocation {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method: method.as_str().to_string(),
            headers: HeaderBag::new(),
            params: Map::new(),
            body: Value::Null,
            auth: Value::Null,
            timeout: DEFAULT_TIMEOUT_MS,
            follow_redirects: true,
            verify_ssl: true,
            api_request_id: None,
        }
    }

    /// Reads an invocation from loosely-typed JSON, tolerating nulls where
    /// a default exists.
    pub fn from_value(args: &Value) -> Result<Self, EngineError> {
        let Some(obj) = args.as_object() else {
            return Err(EngineError::validation("Invocation must be a JSON object"));
        };
        let text = |key: &str| -> Result<Option<String>, EngineError> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(EngineError::validation(format!("{} must be a string", key))),
            }
        };
        let flag = |key: &str| -> Result<bool, EngineError> {
            match obj.get(key) {
                None | Some(Value::Null) => Ok(true),
                Some(Value::Bool(b)) => Ok(*b),
                Some(_) => Err(EngineError::validation(format!("{} must be a boolean", key))),
            }
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(EngineError::validation("params must be an object")),
        };
        let timeout = match obj.get("timeout") {
            None | Some(Value::Null) => DEFAULT_TIMEOUT_MS,
            Some(value) => value
                .as_u64()
                .ok_or_else(|| EngineError::validation("timeout must be a non-negative integer"))?,
        };
        let api_request_id = match text("api_request_id")? {
            Some(raw) if !raw.trim().is_empty() => Some(
                Uuid::parse_str(raw.trim())
                    .map_err(|_| EngineError::validation("api_request_id must be a UUID"))?,
            ),
            _ => None,
        };

        Ok(Self {
            url: text("url")?.unwrap_or_default(),
            method: text("method")?.unwrap_or_else(default_method),
            headers: HeaderBag::from_value(obj.get("headers").unwrap_or(&Value::Null))?,
            params,
            body: obj.get("body").cloned().unwrap_or(Value::Null),
            auth: obj.get("auth").cloned().unwrap_or(Value::Null),
            timeout,
            follow_redirects: flag("follow_redirects")?,
            verify_ssl: flag("verify_ssl")?,
            api_request_id,
        })
    }

    /// Turns the invocation into the initial request spec. Fails before any
    /// network activity when the URL is missing or the method is unsupported.
    pub fn to_spec(&self) -> Result<RequestSpec, EngineError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(EngineError::validation("URL is required"));
        }
        let method: HttpMethod = self.method.parse()?;
        Ok(RequestSpec {
            url: url.to_string(),
            method,
            headers: self.headers.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            credentials: None,
            timeout_ms: self.timeout,
            follow_redirects: self.follow_redirects,
            verify_ssl: self.verify_ssl,
        })
    }
}
