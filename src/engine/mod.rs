//! Request execution pipeline: auth injection, header defaults, dispatch,
//! response normalization and history recording.

pub mod auth;
pub mod dispatch;
pub mod headers;
pub mod history;
pub mod normalize;
pub mod record;
pub mod spec;
pub mod template;

pub use dispatch::{Dispatcher, PreparedRequest};
pub use history::HistoryRecorder;
pub use normalize::NormalizedResponse;
pub use record::ExecutionRecord;
pub use spec::{AuthConfig, HttpMethod, Invocation, RequestSpec};
pub use template::RequestTemplate;

use crate::constants::history::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::constants::network::TIMEOUT_CEILING_MS;
use crate::errors::EngineError;
use crate::services::logger::Logger;
use crate::stores::HistoryStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub timeout_ceiling: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout_ceiling: Duration::from_millis(TIMEOUT_CEILING_MS),
        }
    }
}

impl EngineSettings {
    /// Reads `PROBEFLEX_TIMEOUT_CEILING_MS`; unparseable or zero values fall
    /// back to the default ceiling.
    pub fn from_env() -> Self {
        let ceiling = std::env::var("PROBEFLEX_TIMEOUT_CEILING_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(TIMEOUT_CEILING_MS);
        Self {
            timeout_ceiling: Duration::from_millis(ceiling),
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub response: NormalizedResponse,
    /// Id of the appended history record, when one was written.
    pub record_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct RequestEngine {
    logger: Logger,
    dispatcher: Dispatcher,
    recorder: HistoryRecorder,
}

impl RequestEngine {
    pub fn new(logger: Logger, settings: EngineSettings, recorder: HistoryRecorder) -> Self {
        Self {
            logger: logger.child("engine"),
            dispatcher: Dispatcher::new(settings.timeout_ceiling),
            recorder,
        }
    }

    pub fn history_store(&self) -> &Arc<dyn HistoryStore> {
        self.recorder.store()
    }

    /// Executes one invocation end to end.
    ///
    /// Validation failures return before any network activity and never
    /// produce a history record. Once the request is prepared, sending it and
    /// recording the outcome run on a spawned task, so dropping the returned
    /// future does not cancel either step.
    pub async fn execute(
        &self,
        invocation: Invocation,
        actor: Option<&str>,
    ) -> Result<Execution, EngineError> {
        let spec = invocation.to_spec()?;
        let auth = AuthConfig::from_value(&invocation.auth)?;
        let logger = self.logger.with_secrets(auth.secret_values());

        let spec = headers::resolve_headers(auth::inject_auth(spec, &auth));
        let prepared = match dispatch::prepare(spec, self.dispatcher.ceiling()) {
            Ok(prepared) => prepared,
            Err(err) => {
                logger.warn("Rejected invocation", Some(&serde_json::json!({
                    "url": invocation.url,
                    "method": invocation.method,
                    "error": err.to_string(),
                })));
                return Err(err);
            }
        };
        if logger.enabled(crate::services::logger::LogLevel::Debug) {
            let mut meta = prepared.spec.describe();
            meta["auth"] = Value::String(auth.scheme().to_string());
            logger.debug("Dispatching request", Some(&meta));
        }

        let dispatcher = self.dispatcher.clone();
        let recorder = self.recorder.clone();
        let template_id = invocation.api_request_id;
        let actor = actor.map(str::to_string);
        let task = tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&prepared).await;
            let elapsed = outcome.elapsed;
            let result = outcome.result.map(|raw| normalize::normalize(raw, elapsed));

            match &result {
                Ok(response) => logger.info(
                    "Request completed",
                    Some(&serde_json::json!({
                        "method": prepared.spec.method.as_str(),
                        "url": prepared.spec.url,
                        "status": response.status_code,
                        "time_ms": response.time,
                    })),
                ),
                Err(err) => logger.warn(
                    "Request failed",
                    Some(&serde_json::json!({
                        "method": prepared.spec.method.as_str(),
                        "url": prepared.spec.url,
                        "error": err.to_string(),
                        "timed_out": err.is_timeout(),
                    })),
                ),
            }

            let mut record_id = None;
            if let Some(template_id) = template_id {
                let record = ExecutionRecord::capture(
                    template_id,
                    &prepared,
                    &auth,
                    result.as_ref(),
                    elapsed,
                    actor.as_deref(),
                );
                match recorder.record(record).await {
                    Ok(id) => record_id = Some(id),
                    Err(err) => logger.warn(
                        "Failed to record execution history",
                        Some(&serde_json::json!({
                            "template_id": template_id.to_string(),
                            "error": err.to_string(),
                        })),
                    ),
                }
            }

            result.map(|response| Execution {
                response,
                record_id,
            })
        });

        task.await
            .map_err(|err| EngineError::internal(format!("Request task failed: {}", err)))?
    }

    /// Boundary form of [`RequestEngine::execute`]: never fails, returns the
    /// normalized response or `{error, kind, status}`.
    pub async fn execute_value(&self, args: &Value, actor: Option<&str>) -> Value {
        let result = match Invocation::from_value(args) {
            Ok(invocation) => self.execute(invocation, actor).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(execution) => match serde_json::to_value(&execution.response) {
                Ok(value) => value,
                Err(err) => EngineError::internal(err.to_string()).to_value(),
            },
            Err(err) => err.to_value(),
        }
    }

    /// Newest-first history for a template. `limit` defaults to 20 and is
    /// capped at 500.
    pub async fn recent_history(
        &self,
        template_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Vec<ExecutionRecord>, EngineError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        self.recorder.store().recent(template_id, limit).await
    }
}
