use serde::Serialize;
use thiserror::Error;

/// Failure classification reported at the invocation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Transport,
    Persistence,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("{message}")]
    Transport {
        message: String,
        timed_out: bool,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Failed to record execution history: {0}")]
    Persistence(String),

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        EngineError::Persistence(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) | EngineError::InvalidMethod(_) => ErrorKind::Validation,
            EngineError::Transport { .. } => ErrorKind::Transport,
            EngineError::Persistence(_) => ErrorKind::Persistence,
            EngineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP-equivalent status a caller may surface for this failure.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Transport => 502,
            ErrorKind::Persistence | ErrorKind::Internal => 500,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Transport { timed_out: true, .. })
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": self.status(),
        })
    }
}

/// Display text of a transport error and its root cause. The request URL is
/// left out because its query string may carry an API key.
fn describe_transport(err: &reqwest::Error) -> String {
    let mut root: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(next) = root.and_then(|cause| cause.source()) {
        root = Some(next);
    }
    match root {
        Some(cause) => format!("{}: {}", err, cause),
        None => err.to_string(),
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        let timed_out = err.is_timeout();
        let message = if timed_out {
            "HTTP request timed out".to_string()
        } else if err.is_connect() {
            format!("Connection failed: {}", describe_transport(&err))
        } else {
            describe_transport(&err)
        };
        EngineError::Transport {
            message,
            timed_out,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Persistence(err.to_string())
    }
}
