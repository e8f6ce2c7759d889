use crate::engine::record::ExecutionRecord;
use crate::errors::EngineError;
use crate::stores::history::HistoryStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    records: Arc<RwLock<HashMap<Uuid, Vec<ExecutionRecord>>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Vec<ExecutionRecord>>>, EngineError>
    {
        self.records
            .read()
            .map_err(|_| EngineError::persistence("history store lock poisoned"))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Vec<ExecutionRecord>>>, EngineError>
    {
        self.records
            .write()
            .map_err(|_| EngineError::persistence("history store lock poisoned"))
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: ExecutionRecord) -> Result<(), EngineError> {
        self.write()?
            .entry(record.template_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn recent(
        &self,
        template_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, EngineError> {
        let guard = self.read()?;
        let Some(records) = guard.get(&template_id) else {
            return Ok(Vec::new());
        };
        // Newest insertion first, then a stable sort keeps that order for equal timestamps.
        let mut out: Vec<ExecutionRecord> = records.iter().rev().cloned().collect();
        out.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn delete_for_template(&self, template_id: Uuid) -> Result<usize, EngineError> {
        Ok(self
            .write()?
            .remove(&template_id)
            .map(|records| records.len())
            .unwrap_or(0))
    }

    fn stats(&self) -> Value {
        let (templates, records) = self
            .records
            .read()
            .map(|guard| (guard.len(), guard.values().map(Vec::len).sum::<usize>()))
            .unwrap_or((0, 0));
        serde_json::json!({
            "store": "memory",
            "templates": templates,
            "records": records,
        })
    }
}
