use crate::engine::template::RequestTemplate;
use crate::errors::EngineError;
use crate::stores::memory_template_store::MemoryTemplateStore;
use crate::stores::template::TemplateStore;
use crate::utils::fs_atomic::write_json_atomic;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const STORE_VERSION: u64 = 1;

/// Template store persisted as a single JSON document, rewritten atomically
/// after every change. A change whose write fails is rolled back in memory.
#[derive(Clone)]
pub struct FileTemplateStore {
    inner: MemoryTemplateStore,
    file_path: PathBuf,
    queue: Arc<Mutex<()>>,
}

impl FileTemplateStore {
    pub fn open(file_path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let store = Self {
            inner: MemoryTemplateStore::new(),
            file_path: file_path.as_ref().to_path_buf(),
            queue: Arc::new(Mutex::new(())),
        };
        store.load_from_disk()?;
        Ok(store)
    }

    fn load_from_disk(&self) -> Result<(), EngineError> {
        if !self.file_path.exists() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.file_path).map_err(|err| {
            EngineError::internal(format!("Failed to load template store: {}", err))
        })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
            EngineError::internal(format!("Failed to parse template store: {}", err))
        })?;
        let entries = parsed
            .get("templates")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        let templates: Vec<RequestTemplate> = serde_json::from_value(entries).map_err(|err| {
            EngineError::internal(format!("Failed to parse template store: {}", err))
        })?;
        self.inner.load(templates)
    }

    fn persist(&self) -> Result<(), EngineError> {
        let document = serde_json::json!({
            "version": STORE_VERSION,
            "updated_at": chrono::Utc::now().to_rfc3339(),
            "templates": self.inner.snapshot()?,
        });
        write_json_atomic(&self.file_path, &document).map_err(|err| {
            EngineError::internal(format!("Failed to persist template store: {}", err))
        })
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn get(&self, id: Uuid) -> Result<Option<RequestTemplate>, EngineError> {
        self.inner.get(id).await
    }

    async fn put(&self, template: RequestTemplate) -> Result<RequestTemplate, EngineError> {
        let _queue = self.queue.lock().await;
        let previous = self.inner.get(template.id).await?;
        let stored = self.inner.put(template).await?;
        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.inner.load(vec![previous])?,
                None => {
                    self.inner.delete(stored.id).await?;
                }
            }
            return Err(err);
        }
        Ok(stored)
    }

    async fn list(&self, collection_id: Option<&str>) -> Result<Vec<RequestTemplate>, EngineError> {
        self.inner.list(collection_id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, EngineError> {
        let _queue = self.queue.lock().await;
        let Some(previous) = self.inner.get(id).await? else {
            return Ok(false);
        };
        self.inner.delete(id).await?;
        if let Err(err) = self.persist() {
            self.inner.load(vec![previous])?;
            return Err(err);
        }
        Ok(true)
    }
}
