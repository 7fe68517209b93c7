use std::error::Error;
use std::fmt;

/// Service-level error for the analytics pipeline. Every failure an
/// endpoint can report is one of these kinds.
#[derive(Debug)]
pub enum AnalyticsError {
    ConfigMissing(String),
    ConnectionFailed(String),
    QueryFailed { sql: String, message: String },
    InvalidGeneratedSql { sql: String, reason: String },
    LlmFailed(String),
    SchemaLookupFailed(String),
}

impl AnalyticsError {
    /// Stable machine-readable kind string, used in error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::ConfigMissing(_) => "connection-configuration-missing",
            AnalyticsError::ConnectionFailed(_) => "connection-failed",
            AnalyticsError::QueryFailed { .. } => "query-execution-failed",
            AnalyticsError::InvalidGeneratedSql { .. } => "generated-sql-invalid",
            AnalyticsError::LlmFailed(_) => "llm-call-failed",
            AnalyticsError::SchemaLookupFailed(_) => "schema-lookup-failed",
        }
    }

    /// Human-facing hint attached to error payloads.
    pub fn suggestion(&self) -> &'static str {
        match self {
            AnalyticsError::ConfigMissing(_) => {
                "Check database and LLM settings in config.toml or FABRIC__ environment variables"
            }
            AnalyticsError::ConnectionFailed(_) => {
                "Check that the warehouse is reachable and the database path is correct"
            }
            AnalyticsError::QueryFailed { .. } => {
                "Try rephrasing your question or use /api/fabric/tables to see available tables"
            }
            AnalyticsError::InvalidGeneratedSql { .. } => {
                "Try rephrasing your question to reference the available tables"
            }
            AnalyticsError::LlmFailed(_) => {
                "Check the LLM backend configuration and that the service is reachable"
            }
            AnalyticsError::SchemaLookupFailed(_) => {
                "Verify the table name with /api/fabric/list-tables"
            }
        }
    }
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsError::ConfigMissing(msg) => {
                write!(f, "Missing connection configuration: {}", msg)
            }
            AnalyticsError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            AnalyticsError::QueryFailed { sql, message } => {
                write!(f, "Query execution failed: {} (SQL: {})", message, sql)
            }
            AnalyticsError::InvalidGeneratedSql { sql, reason } => {
                write!(f, "Generated SQL is invalid: {} (SQL: {})", reason, sql)
            }
            AnalyticsError::LlmFailed(msg) => write!(f, "LLM call failed: {}", msg),
            AnalyticsError::SchemaLookupFailed(msg) => write!(f, "Schema lookup failed: {}", msg),
        }
    }
}

impl Error for AnalyticsError {}
