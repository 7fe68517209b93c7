use crate::analyze::Analyzer;
use crate::config::AppConfig;
use crate::llm::{LlmError, LlmManager};
use crate::warehouse::duckdb::DuckDbWarehouse;
use std::sync::Arc;

/// Shared application state for the web server.
///
/// Everything here is read-only per request; the only value that mutates
/// after startup is the collation cell inside the catalog.
pub struct AppState {
    pub config: AppConfig,
    pub analyzer: Analyzer,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, LlmError> {
        let warehouse = Arc::new(DuckDbWarehouse::new(&config.warehouse));
        let llm = Arc::new(LlmManager::new(&config.llm)?);
        let analyzer = Analyzer::new(warehouse, llm);

        Ok(Self {
            config,
            analyzer,
            startup_time: chrono::Utc::now(),
        })
    }
}
