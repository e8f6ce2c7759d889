use crate::engine::{EngineSettings, HistoryRecorder, RequestEngine};
use crate::errors::ToolError;
use crate::managers::request::RequestManager;
use crate::mcp::catalog::tool_catalog;
use crate::services::access::{AccessPolicy, AllowAll};
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::validation::Validation;
use crate::stores::file_template_store::FileTemplateStore;
use crate::stores::memory_history_store::MemoryHistoryStore;
use crate::stores::sqlite_history_store::SqliteHistoryStore;
use crate::stores::{HistoryStore, TemplateStore};
use crate::utils::paths::{resolve_history_db_path, resolve_templates_path};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub engine: Arc<RequestEngine>,
    pub templates: Arc<dyn TemplateStore>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in the catalog must have a handler.".to_string())
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    fn history_store_from_env(logger: &Logger) -> Result<Arc<dyn HistoryStore>, ToolError> {
        let kind = std::env::var("PROBEFLEX_HISTORY_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .trim()
            .to_lowercase();
        match kind.as_str() {
            "memory" => {
                logger.warn("History is kept in memory and lost on exit", None);
                Ok(Arc::new(MemoryHistoryStore::new()))
            }
            "sqlite" | "" => {
                let path = resolve_history_db_path();
                logger.info(
                    "Opening history database",
                    Some(&serde_json::json!({ "path": path.display().to_string() })),
                );
                Ok(Arc::new(SqliteHistoryStore::open(path)?))
            }
            other => Err(ToolError::invalid_params(format!(
                "PROBEFLEX_HISTORY_STORE must be sqlite or memory, got '{}'",
                other
            ))),
        }
    }

    /// Wires the server from environment configuration.
    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("probeflex");
        let history = Self::history_store_from_env(&logger)?;
        let templates: Arc<dyn TemplateStore> =
            Arc::new(FileTemplateStore::open(resolve_templates_path())?);
        Self::build(
            logger,
            EngineSettings::from_env(),
            history,
            templates,
            Arc::new(AllowAll),
        )
    }

    pub fn build(
        logger: Logger,
        settings: EngineSettings,
        history: Arc<dyn HistoryStore>,
        templates: Arc<dyn TemplateStore>,
        access: Arc<dyn AccessPolicy>,
    ) -> Result<Self, ToolError> {
        let recorder = HistoryRecorder::new(history).with_templates(templates.clone());
        let engine = Arc::new(RequestEngine::new(logger.clone(), settings, recorder));

        let request_manager = Arc::new(RequestManager::new(
            logger.clone(),
            Validation::new(),
            engine.clone(),
            templates.clone(),
            access,
        ));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("probe_request".to_string(), request_manager);
        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));

        Ok(Self {
            logger,
            engine,
            templates,
            tool_executor,
        })
    }
}
