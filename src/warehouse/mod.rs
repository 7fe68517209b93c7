pub mod catalog;
pub mod duckdb;
pub mod sampler;

use crate::error::AnalyticsError;
use async_trait::async_trait;

/// One result row, column name to value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Connection-per-call access to the analytics warehouse.
///
/// Queries are phrased in the warehouse surface dialect the pipeline speaks:
/// `SELECT TOP n`, `[schema].[Table]` quoting. Adapters are free to rewrite
/// that surface into whatever their engine accepts.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Open a connection, run `sql`, map rows to column-keyed records, and
    /// close the connection again regardless of outcome.
    async fn execute(&self, sql: &str) -> Result<Vec<Record>, AnalyticsError>;

    /// Report the database collation name, e.g. `SQL_Latin1_General_CP1_CI_AS`.
    async fn collation(&self) -> Result<String, AnalyticsError>;
}

/// Escapes a string for inclusion in a single-quoted SQL literal.
pub fn quote_literal(value: &str) -> String {
    value.replace('\'', "''")
}
