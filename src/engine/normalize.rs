use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Status, headers and fully-read body as they came off the wire.
#[derive(Debug, Clone)]
pub struct RawExchange {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Milliseconds spent sending the request and reading the response.
    pub time: f64,
}

pub fn normalize(raw: RawExchange, elapsed: Duration) -> NormalizedResponse {
    NormalizedResponse {
        status_code: raw.status,
        headers: flatten_headers(&raw.headers),
        body: parse_body(&raw.body),
        time: elapsed_ms(elapsed),
    }
}

/// JSON when the bytes parse as JSON, otherwise the text as received.
pub fn parse_body(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(parsed) => parsed,
        Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Repeated headers collapse to their last value.
pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        let text = match value.to_str() {
            Ok(text) => text.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        out.insert(name.as_str().to_string(), text);
    }
    out
}

pub fn elapsed_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
