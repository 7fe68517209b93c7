use crate::config::WarehouseConfig;
use crate::error::AnalyticsError;
use crate::warehouse::{Record, Warehouse};
use async_trait::async_trait;
use duckdb::types::ValueRef;
use duckdb::Connection;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, error};

/// Embedded DuckDB warehouse adapter.
///
/// Every call opens its own connection and drops it when done; there is no
/// pool and no shared mutable state. Queries arrive in the pipeline's
/// T-SQL-flavored surface dialect and are rewritten to DuckDB syntax before
/// execution.
pub struct DuckDbWarehouse {
    database: String,
    connect_timeout: Duration,
}

impl DuckDbWarehouse {
    pub fn new(config: &WarehouseConfig) -> Self {
        Self {
            database: config.database.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

/// Rewrites the surface dialect into DuckDB syntax.
///
/// Best-effort regex rewrite, not a parser: bracket-quoted identifiers become
/// double-quoted, and a leading `SELECT TOP n` becomes a trailing `LIMIT n`.
pub fn rewrite_for_engine(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';').trim();

    let bracket_re = Regex::new(r"\[([^\[\]]+)\]").unwrap();
    let sql = bracket_re.replace_all(sql, "\"$1\"").to_string();

    let top_re = Regex::new(r"(?i)^\s*SELECT\s+TOP\s+(\d+)\s+").unwrap();
    if let Some(caps) = top_re.captures(&sql) {
        let limit = caps[1].to_string();
        let rest = &sql[caps.get(0).map(|m| m.end()).unwrap_or(0)..];
        return format!("SELECT {} LIMIT {}", rest, limit);
    }

    sql
}

fn value_to_json(row: &duckdb::Row<'_>, idx: usize) -> serde_json::Value {
    use serde_json::Value;

    match row.get_ref(idx) {
        Ok(val_ref) => match val_ref {
            ValueRef::Null => Value::Null,
            ValueRef::Boolean(b) => Value::Bool(b),
            ValueRef::TinyInt(n) => Value::from(n),
            ValueRef::SmallInt(n) => Value::from(n),
            ValueRef::Int(n) => Value::from(n),
            ValueRef::BigInt(n) => Value::from(n),
            ValueRef::UTinyInt(n) => Value::from(n),
            ValueRef::USmallInt(n) => Value::from(n),
            ValueRef::UInt(n) => Value::from(n),
            ValueRef::UBigInt(n) => Value::from(n),
            ValueRef::Float(n) => serde_json::Number::from_f64(n as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Double(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
            // Timestamps, decimals, blobs and nested types go through the
            // driver's string conversion.
            _ => match row.get::<_, String>(idx) {
                Ok(v) => Value::String(v),
                Err(_) => Value::String("ERROR".to_string()),
            },
        },
        Err(_) => Value::String("ERROR".to_string()),
    }
}

fn run_query(database: &str, sql: &str) -> Result<Vec<Record>, AnalyticsError> {
    let conn = Connection::open(database).map_err(|e| {
        error!("Failed to open warehouse at {}: {}", database, e);
        AnalyticsError::ConnectionFailed(e.to_string())
    })?;

    let as_failed = |e: duckdb::Error| AnalyticsError::QueryFailed {
        sql: sql.to_string(),
        message: e.to_string(),
    };

    let mut stmt = conn.prepare(sql).map_err(as_failed)?;

    let mut rows = stmt.query([]).map_err(as_failed)?;

    let mut records = Vec::new();
    while let Some(row) = rows.next().map_err(as_failed)? {
        let statement = row.as_ref();
        let column_count = statement.column_count();

        let mut record = Record::new();
        for i in 0..column_count {
            let name = match statement.column_name(i) {
                Ok(name) => name.to_string(),
                Err(_) => format!("column_{}", i),
            };
            record.insert(name, value_to_json(row, i));
        }
        records.push(record);
    }

    Ok(records)
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn execute(&self, sql: &str) -> Result<Vec<Record>, AnalyticsError> {
        let engine_sql = rewrite_for_engine(sql);
        debug!("Engine SQL: {}", engine_sql);

        let database = self.database.clone();
        let task =
            tokio::task::spawn_blocking(move || run_query(&database, &engine_sql));

        match tokio::time::timeout(self.connect_timeout, task).await {
            Ok(Ok(result)) => {
                if let Ok(records) = &result {
                    debug!("Query returned {} rows", records.len());
                }
                result
            }
            Ok(Err(join_err)) => {
                error!("Warehouse task panicked: {}", join_err);
                Err(AnalyticsError::ConnectionFailed(join_err.to_string()))
            }
            Err(_) => Err(AnalyticsError::ConnectionFailed(format!(
                "warehouse call timed out after {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }

    async fn collation(&self) -> Result<String, AnalyticsError> {
        let rows = self
            .execute("SELECT current_setting('default_collation') AS collation")
            .await?;

        let collation = rows
            .first()
            .and_then(|row| row.get("collation"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        // An unset default collation means binary (case-sensitive) compares.
        if collation.is_empty() {
            Ok("BINARY".to_string())
        } else {
            Ok(collation)
        }
    }
}
