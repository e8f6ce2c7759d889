use crate::engine::template::RequestTemplate;
use crate::errors::EngineError;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<RequestTemplate>, EngineError>;

    async fn put(&self, template: RequestTemplate) -> Result<RequestTemplate, EngineError>;

    async fn list(&self, collection_id: Option<&str>) -> Result<Vec<RequestTemplate>, EngineError>;

    async fn delete(&self, id: Uuid) -> Result<bool, EngineError>;
}
