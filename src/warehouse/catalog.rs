use crate::error::AnalyticsError;
use crate::warehouse::{quote_literal, Warehouse};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Default schema for bare table names.
pub const DEFAULT_SCHEMA: &str = "main";

/// A base table discovered in the warehouse metadata views.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    pub full_name: String,
    /// Qualified, bracket-quoted form the generated SQL is expected to use.
    pub working_format: String,
    /// Whether a one-row probe against the table succeeded.
    pub accessible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: String,
    pub is_nullable: String,
}

impl ColumnDescriptor {
    /// String-typed columns get distinct-value sampling for prompt grounding.
    pub fn is_string_typed(&self) -> bool {
        let ty = self.data_type.to_lowercase();
        ty.contains("char") || ty.contains("text") || ty.contains("string")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
}

// Connection failures keep their own kind; anything else during metadata
// reads is reported as a schema lookup failure.
fn lookup_err(e: AnalyticsError) -> AnalyticsError {
    match e {
        AnalyticsError::ConnectionFailed(_) => e,
        other => AnalyticsError::SchemaLookupFailed(other.to_string()),
    }
}

/// Reads table and column metadata from the warehouse.
///
/// Stateless apart from the collation value, which is fetched once per
/// process and memoized.
pub struct SchemaCatalog {
    warehouse: Arc<dyn Warehouse>,
    collation: OnceCell<String>,
}

impl SchemaCatalog {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            collation: OnceCell::new(),
        }
    }

    /// Lists base tables outside the system schemas, probing each for read
    /// access. A failed probe marks the table unverified but keeps it listed.
    pub async fn list_tables(&self) -> Result<Vec<TableDescriptor>, AnalyticsError> {
        let query = "SELECT table_schema, table_name \
                     FROM information_schema.tables \
                     WHERE table_type = 'BASE TABLE' \
                     AND table_schema NOT IN ('information_schema', 'pg_catalog') \
                     ORDER BY table_schema, table_name";

        let rows = self
            .warehouse
            .execute(query)
            .await
            .map_err(lookup_err)?;

        let mut tables = Vec::new();
        for row in rows {
            let schema = row
                .get("table_schema")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let name = row
                .get("table_name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let full_name = format!("{}.{}", schema, name);
            let working_format = format!("[{}].[{}]", schema, name);

            let probe = format!("SELECT TOP 1 * FROM {}", working_format);
            let accessible = match self.warehouse.execute(&probe).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("Table {} not accessible: {}", full_name, e);
                    false
                }
            };

            tables.push(TableDescriptor {
                schema,
                name,
                full_name,
                working_format,
                accessible,
            });
        }

        debug!("Found {} tables", tables.len());
        Ok(tables)
    }

    /// Column metadata for a table given as `schema.table` or a bare name.
    ///
    /// Bare names are matched case-insensitively against the catalog listing
    /// and fall back to the default schema.
    pub async fn table_schema(&self, table_name: &str) -> Result<TableSchema, AnalyticsError> {
        let (schema, table) = if let Some((schema, table)) = table_name.split_once('.') {
            (schema.to_string(), table.to_string())
        } else {
            let all_tables = self.list_tables().await?;
            match all_tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(table_name))
            {
                Some(t) => (t.schema.clone(), t.name.clone()),
                None => (DEFAULT_SCHEMA.to_string(), table_name.to_string()),
            }
        };

        let query = format!(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = '{}' AND table_name = '{}' \
             ORDER BY ordinal_position",
            quote_literal(&schema),
            quote_literal(&table)
        );

        let rows = self
            .warehouse
            .execute(&query)
            .await
            .map_err(lookup_err)?;

        if rows.is_empty() {
            return Err(AnalyticsError::SchemaLookupFailed(format!(
                "no columns found for table {}.{}",
                schema, table
            )));
        }

        let columns = rows
            .iter()
            .map(|row| ColumnDescriptor {
                name: row
                    .get("column_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                data_type: row
                    .get("data_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                is_nullable: row
                    .get("is_nullable")
                    .and_then(|v| v.as_str())
                    .unwrap_or("YES")
                    .to_string(),
            })
            .collect();

        Ok(TableSchema {
            table_name: format!("{}.{}", schema, table),
            columns,
        })
    }

    /// Database collation, fetched once per process and memoized.
    pub async fn collation(&self) -> Result<String, AnalyticsError> {
        self.collation
            .get_or_try_init(|| async {
                let collation = self.warehouse.collation().await?;
                debug!("Database collation: {}", collation);
                Ok(collation)
            })
            .await
            .cloned()
    }

    /// Whether string comparisons are case-insensitive under the database
    /// collation. Unknown collations are treated as case-sensitive.
    pub async fn is_case_insensitive(&self) -> bool {
        match self.collation().await {
            Ok(collation) => {
                let upper = collation.to_uppercase();
                upper.contains("CI") || upper.contains("NOCASE")
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::Record;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut map = Record::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), serde_json::Value::String(v.to_string()));
        }
        map
    }

    struct MockWarehouse {
        collation_name: String,
        collation_calls: AtomicUsize,
        broken_table: Option<String>,
    }

    impl MockWarehouse {
        fn new(collation: &str) -> Self {
            Self {
                collation_name: collation.to_string(),
                collation_calls: AtomicUsize::new(0),
                broken_table: None,
            }
        }
    }

    #[async_trait]
    impl Warehouse for MockWarehouse {
        async fn execute(&self, sql: &str) -> Result<Vec<Record>, AnalyticsError> {
            if sql.contains("information_schema.tables") {
                return Ok(vec![
                    record(&[("table_schema", "main"), ("table_name", "devices")]),
                    record(&[("table_schema", "main"), ("table_name", "threats")]),
                ]);
            }
            if sql.starts_with("SELECT TOP 1 * FROM ") {
                if let Some(broken) = &self.broken_table {
                    if sql.contains(broken.as_str()) {
                        return Err(AnalyticsError::QueryFailed {
                            sql: sql.to_string(),
                            message: "permission denied".to_string(),
                        });
                    }
                }
                return Ok(vec![record(&[("id", "1")])]);
            }
            if sql.contains("information_schema.columns") {
                return Ok(vec![
                    record(&[
                        ("column_name", "id"),
                        ("data_type", "INTEGER"),
                        ("is_nullable", "NO"),
                    ]),
                    record(&[
                        ("column_name", "name"),
                        ("data_type", "VARCHAR"),
                        ("is_nullable", "YES"),
                    ]),
                ]);
            }
            Ok(Vec::new())
        }

        async fn collation(&self) -> Result<String, AnalyticsError> {
            self.collation_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.collation_name.clone())
        }
    }

    #[tokio::test]
    async fn lists_tables_with_working_format() {
        let catalog = SchemaCatalog::new(Arc::new(MockWarehouse::new("BINARY")));
        let tables = catalog.list_tables().await.unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].full_name, "main.devices");
        assert_eq!(tables[0].working_format, "[main].[devices]");
        assert!(tables[0].accessible);
    }

    #[tokio::test]
    async fn failed_probe_keeps_table_listed() {
        let mut mock = MockWarehouse::new("BINARY");
        mock.broken_table = Some("[main].[threats]".to_string());
        let catalog = SchemaCatalog::new(Arc::new(mock));

        let tables = catalog.list_tables().await.unwrap();
        assert_eq!(tables.len(), 2);
        let threats = tables.iter().find(|t| t.name == "threats").unwrap();
        assert!(!threats.accessible);
    }

    #[tokio::test]
    async fn bare_table_name_resolves_through_listing() {
        let catalog = SchemaCatalog::new(Arc::new(MockWarehouse::new("BINARY")));
        let schema = catalog.table_schema("Devices").await.unwrap();
        assert_eq!(schema.table_name, "main.devices");
        assert_eq!(schema.columns.len(), 2);
        assert!(schema.columns[1].is_string_typed());
    }

    #[tokio::test]
    async fn collation_is_memoized() {
        let mock = Arc::new(MockWarehouse::new("SQL_Latin1_General_CP1_CI_AS"));
        let catalog = SchemaCatalog::new(mock.clone());

        assert_eq!(
            catalog.collation().await.unwrap(),
            "SQL_Latin1_General_CP1_CI_AS"
        );
        assert!(catalog.is_case_insensitive().await);
        let _ = catalog.collation().await.unwrap();

        assert_eq!(mock.collation_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn binary_collation_is_case_sensitive() {
        let catalog = SchemaCatalog::new(Arc::new(MockWarehouse::new("BINARY")));
        assert!(!catalog.is_case_insensitive().await);
    }
}
