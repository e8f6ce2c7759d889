use crate::engine::record::ExecutionRecord;
use crate::errors::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

/// Append-only storage for execution records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: ExecutionRecord) -> Result<(), EngineError>;

    /// Most recent records for a template, newest first.
    async fn recent(&self, template_id: Uuid, limit: usize)
        -> Result<Vec<ExecutionRecord>, EngineError>;

    /// Removes a template's records when the template itself is deleted.
    async fn delete_for_template(&self, template_id: Uuid) -> Result<usize, EngineError>;

    fn stats(&self) -> Value;
}
