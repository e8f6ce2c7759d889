pub mod file_template_store;
pub mod history;
pub mod memory_history_store;
pub mod memory_template_store;
pub mod sqlite_history_store;
pub mod template;

pub use history::HistoryStore;
pub use template::TemplateStore;
