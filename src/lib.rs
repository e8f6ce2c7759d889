pub mod app;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod managers;
pub mod mcp;
pub mod services;
pub mod stores;
pub mod utils;
