use crate::engine::record::ExecutionRecord;
use crate::errors::EngineError;
use crate::stores::{HistoryStore, TemplateStore};
use std::sync::Arc;
use uuid::Uuid;

/// Appends execution records, refusing records for templates the template
/// store does not know.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    templates: Option<Arc<dyn TemplateStore>>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            templates: None,
        }
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateStore>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub async fn record(&self, record: ExecutionRecord) -> Result<Uuid, EngineError> {
        if let Some(templates) = &self.templates {
            let known = templates
                .get(record.template_id)
                .await
                .map_err(|err| EngineError::persistence(err.to_string()))?;
            if known.is_none() {
                return Err(EngineError::persistence(format!(
                    "Unknown request template {}",
                    record.template_id
                )));
            }
        }
        let id = record.id;
        self.store.append(record).await?;
        Ok(id)
    }
}
