use crate::engine::template::RequestTemplate;
use crate::errors::EngineError;
use crate::stores::template::TemplateStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryTemplateStore {
    templates: Arc<RwLock<HashMap<Uuid, RequestTemplate>>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, templates: Vec<RequestTemplate>) -> Result<(), EngineError> {
        let mut guard = self
            .templates
            .write()
            .map_err(|_| EngineError::internal("template store lock poisoned"))?;
        for template in templates {
            guard.insert(template.id, template);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Vec<RequestTemplate>, EngineError> {
        let guard = self
            .templates
            .read()
            .map_err(|_| EngineError::internal("template store lock poisoned"))?;
        let mut out: Vec<RequestTemplate> = guard.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(out)
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get(&self, id: Uuid) -> Result<Option<RequestTemplate>, EngineError> {
        let guard = self
            .templates
            .read()
            .map_err(|_| EngineError::internal("template store lock poisoned"))?;
        Ok(guard.get(&id).cloned())
    }

    async fn put(&self, template: RequestTemplate) -> Result<RequestTemplate, EngineError> {
        let mut guard = self
            .templates
            .write()
            .map_err(|_| EngineError::internal("template store lock poisoned"))?;
        let mut stored = template;
        if let Some(existing) = guard.get(&stored.id) {
            stored.created_at = existing.created_at;
        }
        stored.updated_at = chrono::Utc::now();
        guard.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list(&self, collection_id: Option<&str>) -> Result<Vec<RequestTemplate>, EngineError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|t| collection_id.map(|c| t.collection_id == c).unwrap_or(true))
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EngineError> {
        let mut guard = self
            .templates
            .write()
            .map_err(|_| EngineError::internal("template store lock poisoned"))?;
        Ok(guard.remove(&id).is_some())
    }
}
