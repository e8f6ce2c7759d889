use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_REDACTION: &str = "[REDACTED]";
const INLINE_REDACTION: &str = "***REDACTED***";
const MIN_INLINE_SECRET_LEN: usize = 6;

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "passphrase",
        "secret",
        "token",
        "api_key",
        "apikey",
        "auth_token",
        "client_secret",
        "refresh_token",
        "authorization",
    ]
    .into_iter()
    .collect()
});

static SENSITIVE_HEADER_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "authorization",
        "proxy-authorization",
        "cookie",
        "set-cookie",
        "x-api-key",
        "x-auth-token",
        "x-access-token",
    ]
    .into_iter()
    .collect()
});

// Fields of an auth config that identify the scheme rather than carry a credential.
const AUTH_PUBLIC_FIELDS: &[&str] = &["type", "username", "key", "location"];

static INLINE_REDACTION_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b")
                .expect("inline redaction regex"),
            INLINE_REDACTION,
        ),
        (
            Regex::new(r"\b(Bearer|Basic)\s+([A-Za-z0-9._~+/=-]{6,})").expect("inline redaction regex"),
            "$1 ***REDACTED***",
        ),
        (
            Regex::new(r#"\b(password|passwd|token|api[_-]?key|secret|access[_-]?token)\b\s*([:=])\s*([^\s"'`&]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
    ]
});

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    if normalized.is_empty() {
        return false;
    }
    if SENSITIVE_KEYS.contains(normalized.as_str()) {
        return true;
    }
    normalized.contains("secret") || normalized.contains("token")
}

fn truncate_string(value: &str, max_length: usize) -> String {
    if max_length == usize::MAX {
        return value.to_string();
    }
    if max_length == 0 {
        return "".to_string();
    }
    if value.len() <= max_length {
        return value.to_string();
    }
    format!("{}...", truncate_utf8_prefix(value, max_length))
}

fn is_extra_secret(value: &str, extra: Option<&[String]>) -> bool {
    extra
        .map(|values| values.iter().any(|secret| !secret.is_empty() && secret == value))
        .unwrap_or(false)
}

fn redact_inline_secrets(value: &str, extra: Option<&[String]>) -> String {
    if is_extra_secret(value, extra) {
        return DEFAULT_REDACTION.to_string();
    }
    let mut out = value.to_string();
    for (re, replacement) in INLINE_REDACTION_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }

    if let Some(values) = extra {
        for raw in values {
            let needle = raw.trim();
            if needle.len() < MIN_INLINE_SECRET_LEN {
                continue;
            }
            out = out.replace(needle, INLINE_REDACTION);
        }
    }

    out
}

pub fn redact_text(value: &str, max_string: usize, extra_secrets: Option<&[String]>) -> String {
    let redacted = redact_inline_secrets(value, extra_secrets);
    truncate_string(&redacted, max_string)
}

fn redact_headers(value: &Value, max_string: usize, extra: Option<&[String]>) -> Value {
    let Some(map) = value.as_object() else {
        return redact_object(value, max_string, extra);
    };
    let mut out = serde_json::Map::new();
    for (key, entry) in map.iter() {
        let normalized = normalize_key(key);
        if SENSITIVE_HEADER_KEYS.contains(normalized.as_str()) {
            out.insert(key.clone(), Value::String(DEFAULT_REDACTION.to_string()));
        } else if let Some(text) = entry.as_str() {
            out.insert(
                key.clone(),
                Value::String(redact_text(text, max_string, extra)),
            );
        } else {
            out.insert(key.clone(), entry.clone());
        }
    }
    Value::Object(out)
}

fn redact_auth(value: &Value, max_string: usize, extra: Option<&[String]>) -> Value {
    let Some(map) = value.as_object() else {
        return redact_object(value, max_string, extra);
    };
    let mut out = serde_json::Map::new();
    for (key, entry) in map.iter() {
        if AUTH_PUBLIC_FIELDS.contains(&key.as_str()) {
            out.insert(key.clone(), redact_object(entry, max_string, extra));
        } else {
            out.insert(key.clone(), Value::String(DEFAULT_REDACTION.to_string()));
        }
    }
    Value::Object(out)
}

pub fn redact_object(value: &Value, max_string: usize, extra_secrets: Option<&[String]>) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(text) => Value::String(redact_text(text, max_string, extra_secrets)),
        Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_object(item, max_string, extra_secrets))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.iter() {
                let normalized = normalize_key(key);
                if normalized == "headers" || normalized == "response_headers" {
                    out.insert(
                        key.clone(),
                        redact_headers(entry, max_string, extra_secrets),
                    );
                    continue;
                }
                if normalized == "auth" {
                    out.insert(key.clone(), redact_auth(entry, max_string, extra_secrets));
                    continue;
                }
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(DEFAULT_REDACTION.to_string()));
                    continue;
                }
                out.insert(key.clone(), redact_object(entry, max_string, extra_secrets));
            }
            Value::Object(out)
        }
    }
}

/// Redaction policy bound to a string cap and a set of known secret values,
/// typically the credentials of the invocation being logged.
#[derive(Debug, Clone)]
pub struct Redactor {
    max_string: usize,
    secrets: Arc<Vec<String>>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl Redactor {
    pub fn new(max_string: usize) -> Self {
        Self {
            max_string,
            secrets: Arc::new(Vec::new()),
        }
    }

    /// Adds `secrets` to the known values; blanks are ignored.
    pub fn with_secrets(&self, secrets: impl IntoIterator<Item = String>) -> Self {
        let mut merged: Vec<String> = self.secrets.iter().cloned().collect();
        for secret in secrets {
            if !secret.trim().is_empty() && !merged.contains(&secret) {
                merged.push(secret);
            }
        }
        Self {
            max_string: self.max_string,
            secrets: Arc::new(merged),
        }
    }

    pub fn secrets(&self) -> &[String] {
        &self.secrets
    }

    /// Messages are never truncated, only masked.
    pub fn text(&self, value: &str) -> String {
        redact_text(value, usize::MAX, Some(&self.secrets))
    }

    pub fn value(&self, value: &Value) -> Value {
        redact_object(value, self.max_string, Some(&self.secrets))
    }
}

fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::{redact_object, redact_text, Redactor};
    use serde_json::Value;

    #[test]
    fn redact_object_masks_auth_credentials_but_keeps_scheme() {
        let input = serde_json::json!({
            "auth": {"type": "basic", "username": "alice", "password": "hunter2"}
        });
        let out = redact_object(&input, usize::MAX, None);
        assert_eq!(out["auth"]["type"], "basic");
        assert_eq!(out["auth"]["username"], "alice");
        assert_eq!(out["auth"]["password"], Value::String("[REDACTED]".to_string()));
    }

    #[test]
    fn redact_object_masks_authorization_header_any_case() {
        let input = serde_json::json!({"headers": {"authorization": "Bearer abc", "Accept": "*/*"}});
        let out = redact_object(&input, usize::MAX, None);
        assert_eq!(out["headers"]["authorization"], "[REDACTED]");
        assert_eq!(out["headers"]["Accept"], "*/*");
    }

    #[test]
    fn short_extra_secrets_are_redacted_on_exact_match() {
        let secrets = vec!["k1".to_string()];
        let input = serde_json::json!({"params": {"custom_key": "k1", "page": "2"}});
        let out = redact_object(&input, usize::MAX, Some(&secrets));
        assert_eq!(out["params"]["custom_key"], "[REDACTED]");
        assert_eq!(out["params"]["page"], "2");
    }

    #[test]
    fn long_extra_secrets_are_redacted_inline() {
        let secrets = vec!["s3cr3t-value".to_string()];
        let out = redact_text("url=https://x.test/?k=s3cr3t-value", usize::MAX, Some(&secrets));
        assert!(!out.contains("s3cr3t-value"));
    }

    #[test]
    fn redact_text_truncates_after_redaction() {
        let out = redact_text("abcdefgh", 3, None);
        assert_eq!(out, "abc...");
    }

    #[test]
    fn redactor_masks_scoped_secrets_in_text_and_values() {
        let redactor = Redactor::new(64).with_secrets(vec!["k1".to_string(), String::new()]);
        assert_eq!(redactor.secrets(), ["k1".to_string()]);
        let out = redactor.value(&serde_json::json!({"params": {"api_key_name": "k1"}}));
        assert_eq!(out["params"]["api_key_name"], "[REDACTED]");
        assert_eq!(redactor.text("Bearer abcdef123"), "Bearer ***REDACTED***");
    }
}
