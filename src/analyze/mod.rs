pub mod prompt;
pub mod sanitize;
pub mod summarize;

use crate::error::AnalyticsError;
use crate::llm::LlmManager;
use crate::warehouse::catalog::{SchemaCatalog, TableDescriptor};
use crate::warehouse::sampler::SampleExtractor;
use crate::warehouse::{Record, Warehouse};
use sanitize::GeneratedQuery;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one smart-analyze run.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub question: String,
    pub generated_sql: String,
    pub analysis: String,
    pub result_count: usize,
    pub results: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

/// Introspection payload for the debug endpoint.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    pub question: String,
    pub raw_llm_response: String,
    pub cleaned_sql: String,
    pub starts_with_select: bool,
    pub tables_available: usize,
    pub available_table_names: Vec<String>,
    pub tables_info_preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insufficient_data_reason: Option<String>,
}

/// The question-to-answer pipeline: catalog and samples in, SQL generation
/// and sanitization, execution, then summarization. Sequential, one
/// warehouse connection per step, nothing cached across requests.
pub struct Analyzer {
    warehouse: Arc<dyn Warehouse>,
    catalog: Arc<SchemaCatalog>,
    sampler: SampleExtractor,
    llm: Arc<LlmManager>,
}

impl Analyzer {
    pub fn new(warehouse: Arc<dyn Warehouse>, llm: Arc<LlmManager>) -> Self {
        let catalog = Arc::new(SchemaCatalog::new(warehouse.clone()));
        let sampler = SampleExtractor::new(warehouse.clone());
        Self {
            warehouse,
            catalog,
            sampler,
            llm,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn sampler(&self) -> &SampleExtractor {
        &self.sampler
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.warehouse
    }

    /// Runs the full pipeline for one question.
    pub async fn smart_analyze(
        &self,
        question: &str,
        limit: u32,
    ) -> Result<AnalysisReport, AnalyticsError> {
        let tables = self.catalog.list_tables().await?;
        if tables.is_empty() {
            return Err(AnalyticsError::SchemaLookupFailed(
                "No tables found in the warehouse".to_string(),
            ));
        }

        let query = self.generate_query(question, &tables, limit).await?;
        info!("Generated SQL: {}", query.sql);

        if !query.is_select {
            return Err(AnalyticsError::InvalidGeneratedSql {
                sql: query.sql,
                reason: "Generated query is not a SELECT statement".to_string(),
            });
        }

        if !query.references_known_table {
            return Err(AnalyticsError::InvalidGeneratedSql {
                sql: query.sql,
                reason: "Generated query references invalid tables".to_string(),
            });
        }

        let results = self.warehouse.execute(&query.sql).await?;

        if results.is_empty() {
            let suggestions = self.empty_result_suggestions(&query.sql, &tables).await;
            return Ok(AnalysisReport {
                question: question.to_string(),
                generated_sql: query.sql,
                analysis: "Query executed but returned no results".to_string(),
                result_count: 0,
                results,
                suggestions: Some(suggestions),
            });
        }

        let summary_prompt = summarize::summary_prompt(question, &results, limit as usize);
        let analysis = self.llm.ask(&summary_prompt).await?;

        Ok(AnalysisReport {
            question: question.to_string(),
            generated_sql: query.sql,
            result_count: results.len(),
            results,
            analysis,
            suggestions: None,
        })
    }

    /// First LLM call plus the single relaxed retry on the
    /// INSUFFICIENT_DATA sentinel, followed by cleaning and validation.
    async fn generate_query(
        &self,
        question: &str,
        tables: &[TableDescriptor],
        limit: u32,
    ) -> Result<GeneratedQuery, AnalyticsError> {
        let tables_info = self.sampler.tables_info(&self.catalog, tables).await;
        let case_insensitive = self.catalog.is_case_insensitive().await;
        let smart_prompt = prompt::build_smart_prompt(question, &tables_info, limit, case_insensitive);

        let mut raw = self.llm.ask(&smart_prompt).await?;
        let mut cleaned = sanitize::clean(&raw);

        if sanitize::is_insufficient_data(&cleaned) {
            warn!("LLM returned INSUFFICIENT_DATA; attempting best-guess query");
            let relaxed = prompt::relax_prompt(&smart_prompt);
            raw = self.llm.ask(&relaxed).await?;
            cleaned = sanitize::clean(&raw);
            debug!("Relaxed SQL: {}", cleaned);
        }

        let working_formats: Vec<String> =
            tables.iter().map(|t| t.working_format.clone()).collect();

        Ok(GeneratedQuery::validate(raw, cleaned, limit, &working_formats))
    }

    /// Column-type-driven hints for queries that ran but matched nothing.
    async fn empty_result_suggestions(
        &self,
        sql: &str,
        tables: &[TableDescriptor],
    ) -> Vec<String> {
        let query_lower = sql.to_lowercase();
        let referenced = tables
            .iter()
            .find(|t| query_lower.contains(&t.working_format.to_lowercase()));

        let mut suggestions = Vec::new();
        if let Some(table) = referenced {
            match self.catalog.table_schema(&table.full_name).await {
                Ok(schema) => {
                    for col in &schema.columns {
                        let ty = col.data_type.to_lowercase();
                        if ty.contains("bool") || ty.contains("bit") || ty.contains("int") {
                            suggestions
                                .push(format!("Try [{}] = 0 or [{}] = 1", col.name, col.name));
                        } else if ty.contains("date") || ty.contains("timestamp") {
                            suggestions.push(format!(
                                "Try [{}] < DATEADD(day, -30, GETDATE())",
                                col.name
                            ));
                        } else if col.is_string_typed() {
                            suggestions.push(format!(
                                "Try LOWER([{}]) = LOWER('outdated')",
                                col.name
                            ));
                        }
                    }
                }
                Err(e) => suggestions.push(format!("Error inspecting table: {}", e)),
            }
        }

        if suggestions.is_empty() {
            suggestions = vec![
                "Check column values using /api/fabric/inspect-table".to_string(),
                "Try alternative conditions (e.g., date-based or different status values)"
                    .to_string(),
            ];
        }

        suggestions
    }

    /// Runs generation and cleaning without executing anything.
    pub async fn debug_generation(&self, question: &str) -> Result<DebugReport, AnalyticsError> {
        let limit = 100;
        let tables = self.catalog.list_tables().await?;
        let tables_info = self.sampler.tables_info(&self.catalog, &tables).await;
        let case_insensitive = self.catalog.is_case_insensitive().await;

        let smart_prompt = prompt::build_smart_prompt(question, &tables_info, limit, case_insensitive);
        let raw_response = self.llm.ask(&smart_prompt).await?;
        let cleaned_sql = sanitize::clean(&raw_response);

        let insufficient_data_reason = if sanitize::is_insufficient_data(&cleaned_sql) {
            Some(
                "LLM determined no suitable table/columns match the question. \
                 Check table schemas and column names in 'tables_info_preview'."
                    .to_string(),
            )
        } else {
            None
        };

        let preview: String = tables_info.chars().take(1000).collect();
        let tables_info_preview = if tables_info.chars().count() > 1000 {
            format!("{}...", preview)
        } else {
            preview
        };

        Ok(DebugReport {
            question: question.to_string(),
            starts_with_select: sanitize::is_select(&cleaned_sql),
            raw_llm_response: raw_response,
            cleaned_sql,
            tables_available: tables.len(),
            available_table_names: tables.iter().map(|t| t.full_name.clone()).collect(),
            tables_info_preview,
            insufficient_data_reason,
        })
    }
}
