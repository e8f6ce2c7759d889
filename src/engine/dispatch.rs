use crate::constants::network::{MAX_REDIRECTS, TIMEOUT_CONNECTION_MS};
use crate::constants::protocols::ALLOWED_HTTP;
use crate::engine::normalize::RawExchange;
use crate::engine::spec::RequestSpec;
use crate::errors::EngineError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// A request that passed every pre-network check and is ready to send.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// The request as it goes on the wire: params after the body merge, body
    /// equal to the JSON payload actually sent (null when none is sent).
    pub spec: RequestSpec,
    pub url: Url,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub payload: Option<Vec<u8>>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub elapsed: Duration,
    pub result: Result<RawExchange, EngineError>,
}

/// Applies the method-specific body rules.
///
/// Payload methods always send a JSON value, `{}` when the body is absent or
/// empty. Bodiless methods never send one; an object body is folded into the
/// query parameters without replacing keys the caller already set.
// TODO: drop the body-to-query fold once clients stop attaching bodies to GET/DELETE/HEAD/OPTIONS.
pub fn apply_body_policy(spec: RequestSpec) -> RequestSpec {
    if spec.method.sends_payload() {
        let payload = match &spec.body {
            Value::Null => Value::Object(Map::new()),
            Value::String(text) if text.is_empty() => Value::Object(Map::new()),
            Value::Array(items) if items.is_empty() => Value::Object(Map::new()),
            other => other.clone(),
        };
        return spec.with_body(payload);
    }

    let mut params = spec.params.clone();
    if let Value::Object(fields) = &spec.body {
        for (key, value) in fields {
            params.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    spec.with_params(params).with_body(Value::Null)
}

/// Caller timeouts may only tighten the ceiling; zero means "no preference".
pub fn effective_timeout(requested_ms: u64, ceiling: Duration) -> Duration {
    if requested_ms == 0 {
        return ceiling;
    }
    Duration::from_millis(requested_ms).min(ceiling)
}

fn render_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(rendered) = render_param(item) {
                        pairs.push((key.clone(), rendered));
                    }
                }
            }
            other => {
                if let Some(rendered) = render_param(other) {
                    pairs.push((key.clone(), rendered));
                }
            }
        }
    }
    pairs
}

fn parse_url(raw: &str) -> Result<Url, EngineError> {
    let parsed = Url::parse(raw)
        .map_err(|err| EngineError::validation(format!("Invalid URL '{}': {}", raw, err)))?;
    let scheme = format!("{}:", parsed.scheme());
    if !ALLOWED_HTTP.contains(&scheme.as_str()) {
        return Err(EngineError::validation(
            "Only http/https URLs are supported",
        ));
    }
    Ok(parsed)
}

fn to_header_map(spec: &RequestSpec) -> Result<HeaderMap, EngineError> {
    let mut map = HeaderMap::new();
    for (key, value) in spec.headers.iter() {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| EngineError::validation(format!("Invalid header name '{}'", key)))?;
        let val = HeaderValue::from_str(value)
            .map_err(|_| EngineError::validation(format!("Invalid value for header '{}'", key)))?;
        map.insert(name, val);
    }
    if spec.credentials.is_some() {
        // Basic credentials take over the Authorization slot on the wire.
        map.remove(AUTHORIZATION);
    }
    Ok(map)
}

/// Runs the body policy and all pre-network validation.
pub fn prepare(spec: RequestSpec, ceiling: Duration) -> Result<PreparedRequest, EngineError> {
    let spec = apply_body_policy(spec);
    let url = parse_url(&spec.url)?;
    let headers = to_header_map(&spec)?;
    let payload = if spec.method.sends_payload() {
        Some(serde_json::to_vec(&spec.body).map_err(|err| {
            EngineError::validation(format!("Request body is not serializable: {}", err))
        })?)
    } else {
        None
    };
    Ok(PreparedRequest {
        query: query_pairs(&spec.params),
        timeout: effective_timeout(spec.timeout_ms, ceiling),
        url,
        headers,
        payload,
        spec,
    })
}

/// Sends prepared requests. Clients are cached per (redirect, TLS) policy.
#[derive(Clone)]
pub struct Dispatcher {
    ceiling: Duration,
    clients: Arc<Mutex<HashMap<(bool, bool), Client>>>,
}

impl Dispatcher {
    pub fn new(ceiling: Duration) -> Self {
        Self {
            ceiling,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    fn get_client(&self, follow_redirects: bool, verify_ssl: bool) -> Result<Client, EngineError> {
        let key = (follow_redirects, verify_ssl);
        let mut guard = self
            .clients
            .lock()
            .map_err(|_| EngineError::internal("Failed to access HTTP client cache"))?;
        if let Some(existing) = guard.get(&key) {
            return Ok(existing.clone());
        }
        let redirect = if follow_redirects {
            reqwest::redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = Client::builder()
            .redirect(redirect)
            .danger_accept_invalid_certs(!verify_ssl)
            .timeout(self.ceiling)
            .connect_timeout(Duration::from_millis(TIMEOUT_CONNECTION_MS).min(self.ceiling))
            .build()
            .map_err(|err| EngineError::internal(format!("Failed to build HTTP client: {}", err)))?;
        guard.insert(key, client.clone());
        Ok(client)
    }

    /// Performs the network call. `elapsed` covers sending the request and
    /// reading the complete body, nothing before.
    pub async fn dispatch(&self, prepared: &PreparedRequest) -> DispatchOutcome {
        let client = match self.get_client(prepared.spec.follow_redirects, prepared.spec.verify_ssl)
        {
            Ok(client) => client,
            Err(err) => {
                return DispatchOutcome {
                    elapsed: Duration::ZERO,
                    result: Err(err),
                }
            }
        };

        let mut req = client
            .request(prepared.spec.method.to_reqwest(), prepared.url.clone())
            .headers(prepared.headers.clone())
            .timeout(prepared.timeout);
        if !prepared.query.is_empty() {
            req = req.query(&prepared.query);
        }
        if let Some(credentials) = &prepared.spec.credentials {
            req = req.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(payload) = &prepared.payload {
            req = req.body(payload.clone());
        }

        let started = Instant::now();
        let result = async {
            let response = req.send().await?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(RawExchange {
                status,
                headers,
                body,
            })
        }
        .await
        .map_err(EngineError::from);

        DispatchOutcome {
            elapsed: started.elapsed(),
            result,
        }
    }
}
