use crate::error::AnalyticsError;
use crate::warehouse::catalog::{SchemaCatalog, TableDescriptor};
use crate::warehouse::{Record, Warehouse};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// How many sample rows go into the prompt per table.
const SAMPLE_ROWS: usize = 5;
/// Cap on distinct values collected per string column.
const DISTINCT_CAP: usize = 10;

/// Pulls sample rows and distinct column values to ground the LLM prompt.
pub struct SampleExtractor {
    warehouse: Arc<dyn Warehouse>,
}

/// Full inspection payload for a single table.
#[derive(Debug, Serialize)]
pub struct TableInspection {
    pub table: String,
    pub columns: Vec<String>,
    pub sample_data: Vec<Record>,
    /// Column name to list of distinct values, or an error placeholder string.
    pub unique_values: serde_json::Map<String, Value>,
    pub column_stats: serde_json::Map<String, Value>,
}

impl SampleExtractor {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    pub async fn sample_rows(
        &self,
        working_format: &str,
        limit: usize,
    ) -> Result<Vec<Record>, AnalyticsError> {
        let query = format!("SELECT TOP {} * FROM {}", limit, working_format);
        self.warehouse.execute(&query).await
    }

    /// Distinct non-null values for one column, truncated to `cap`.
    pub async fn distinct_values(
        &self,
        working_format: &str,
        column: &str,
        cap: usize,
    ) -> Result<Vec<Value>, AnalyticsError> {
        let query = format!(
            "SELECT DISTINCT [{col}] FROM {table} WHERE [{col}] IS NOT NULL",
            col = column,
            table = working_format
        );
        let rows = self.warehouse.execute(&query).await?;

        let mut values: Vec<Value> = rows
            .into_iter()
            .filter_map(|mut row| row.remove(column))
            .collect();
        values.truncate(cap);
        Ok(values)
    }

    /// Renders the schema/sample dump handed to the Prompt Builder.
    ///
    /// Per-table schema failures degrade to a one-line entry; per-column
    /// sampling failures become error placeholder strings. Nothing aborts
    /// the dump.
    pub async fn tables_info(
        &self,
        catalog: &SchemaCatalog,
        tables: &[TableDescriptor],
    ) -> String {
        let mut sections = Vec::new();

        for table in tables {
            let schema_info = match catalog.table_schema(&table.full_name).await {
                Ok(info) => info,
                Err(e) => {
                    warn!("Skipping schema for {}: {}", table.full_name, e);
                    sections.push(format!("Table: {} (Schema unavailable)", table.working_format));
                    continue;
                }
            };

            let columns: Vec<String> = schema_info
                .columns
                .iter()
                .map(|col| {
                    format!(
                        "[{}] ({}, Nullable: {})",
                        col.name, col.data_type, col.is_nullable
                    )
                })
                .collect();

            let sample_data = match self.sample_rows(&table.working_format, SAMPLE_ROWS).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Failed to get sample data for {}: {}", table.full_name, e);
                    Vec::new()
                }
            };

            let mut unique_values = serde_json::Map::new();
            for col in schema_info.columns.iter().filter(|c| c.is_string_typed()) {
                let entry = match self
                    .distinct_values(&table.working_format, &col.name, DISTINCT_CAP)
                    .await
                {
                    Ok(values) => Value::Array(values),
                    Err(e) => Value::String(format!("Error: {}", e)),
                };
                unique_values.insert(col.name.clone(), entry);
            }

            sections.push(format!(
                "Table: {}\nColumns: {}\nSample Data: {}\nUnique Values (string columns): {}",
                table.working_format,
                columns.join(", "),
                serde_json::to_string_pretty(&sample_data).unwrap_or_default(),
                serde_json::to_string_pretty(&unique_values).unwrap_or_default(),
            ));
        }

        sections.join("\n\n")
    }

    /// Schema, sample rows, distinct values and per-column counts for one
    /// table. Per-column failures are captured inline, not raised.
    pub async fn inspect(
        &self,
        catalog: &SchemaCatalog,
        table_name: &str,
    ) -> Result<TableInspection, AnalyticsError> {
        let schema_info = catalog.table_schema(table_name).await?;
        let working_format = {
            let (schema, table) = schema_info
                .table_name
                .split_once('.')
                .unwrap_or((super::catalog::DEFAULT_SCHEMA, table_name));
            format!("[{}].[{}]", schema, table)
        };

        let columns: Vec<String> = schema_info.columns.iter().map(|c| c.name.clone()).collect();

        let sample_data = self.sample_rows(&working_format, 10).await?;

        let mut unique_values = serde_json::Map::new();
        let mut column_stats = serde_json::Map::new();

        for col in &columns {
            match self.distinct_values(&working_format, col, DISTINCT_CAP).await {
                Ok(values) => {
                    unique_values.insert(col.clone(), Value::Array(values));
                }
                Err(e) => {
                    unique_values.insert(col.clone(), Value::String(format!("Error: {}", e)));
                    column_stats.insert(col.clone(), Value::String(format!("Error: {}", e)));
                    continue;
                }
            }

            let count_query = format!(
                "SELECT COUNT(DISTINCT [{col}]) AS unique_count, COUNT(*) AS total_count FROM {table}",
                col = col,
                table = working_format
            );
            match self.warehouse.execute(&count_query).await {
                Ok(rows) => {
                    let stats = rows.into_iter().next().unwrap_or_default();
                    column_stats.insert(col.clone(), Value::Object(stats));
                }
                Err(e) => {
                    column_stats.insert(col.clone(), Value::String(format!("Error: {}", e)));
                }
            }
        }

        Ok(TableInspection {
            table: schema_info.table_name,
            columns,
            sample_data,
            unique_values,
            column_stats,
        })
    }
}
