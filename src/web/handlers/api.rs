use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::analyze::{AnalysisReport, DebugReport};
use crate::error::AnalyticsError;
use crate::warehouse::catalog::TableDescriptor;
use crate::warehouse::sampler::TableInspection;
use crate::warehouse::Record;
use crate::web::state::AppState;

// Request types

#[derive(Debug, Deserialize, Clone)]
pub struct SmartQueryRequest {
    pub question: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
pub struct DirectTestRequest {
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DebugParams {
    pub question: String,
}

// Response types

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<TableDescriptor>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ListTablesResponse {
    pub tables: Vec<TableDescriptor>,
    pub count: usize,
    pub table_names: Vec<String>,
    pub full_names: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tables_found: usize,
    pub connection: &'static str,
    pub collation: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct QueryProbe {
    pub query: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_row_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectTestResponse {
    pub message: String,
    pub results: Vec<QueryProbe>,
    pub recommendation: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfoResponse {
    pub database: String,
    pub collation: String,
}

/// Structured error payload for every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tables: Option<Vec<String>>,
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(err: AnalyticsError) -> Self {
        let status = match &err {
            AnalyticsError::InvalidGeneratedSql { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let generated_sql = match &err {
            AnalyticsError::InvalidGeneratedSql { sql, .. } => Some(sql.clone()),
            AnalyticsError::QueryFailed { sql, .. } => Some(sql.clone()),
            _ => None,
        };

        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                kind: err.kind(),
                suggestion: err.suggestion().to_string(),
                generated_sql,
                available_tables: None,
            },
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        Self::new(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Attaches the known table names to errors where they help the caller
/// repair the question (invalid generated SQL, failed execution).
async fn enrich_error(state: &AppState, err: AnalyticsError) -> ApiError {
    let wants_tables = matches!(
        err,
        AnalyticsError::InvalidGeneratedSql { .. } | AnalyticsError::QueryFailed { .. }
    );

    let mut api_err = ApiError::new(err);
    if wants_tables {
        if let Ok(tables) = state.analyzer.catalog().list_tables().await {
            api_err.body.available_tables =
                Some(tables.into_iter().map(|t| t.full_name).collect());
        }
    }
    api_err
}

// Handlers

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok",
        service: "Fabric Analytics Server",
    })
}

pub async fn get_tables(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TablesResponse>, ApiError> {
    let tables = state.analyzer.catalog().list_tables().await?;
    let count = tables.len();
    Ok(Json(TablesResponse { tables, count }))
}

pub async fn smart_analyze(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SmartQueryRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    info!("Smart-analyze question: {}", payload.question);

    match state
        .analyzer
        .smart_analyze(&payload.question, payload.limit)
        .await
    {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            error!("Analysis failed: {}", err);
            Err(enrich_error(&state, err).await)
        }
    }
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    state.analyzer.warehouse().execute("SELECT 1").await?;
    let tables = state.analyzer.catalog().list_tables().await?;
    let collation = state.analyzer.catalog().collation().await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        tables_found: tables.len(),
        connection: "ok",
        collation,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

// Unlike the other endpoints this one reports failures in a 200 body, so
// schema browsers always get a parseable payload.
pub async fn list_all_tables(State(state): State<Arc<AppState>>) -> Response {
    match state.analyzer.catalog().list_tables().await {
        Ok(tables) => {
            let table_names = tables.iter().map(|t| t.name.clone()).collect();
            let full_names = tables.iter().map(|t| t.full_name.clone()).collect();
            let count = tables.len();

            Json(ListTablesResponse {
                tables,
                count,
                table_names,
                full_names,
            })
            .into_response()
        }
        Err(e) => {
            error!("Failed to list tables: {}", e);
            Json(serde_json::json!({
                "error": e.to_string(),
                "suggestion": e.suggestion(),
            }))
            .into_response()
        }
    }
}

/// Qualifies a user-supplied table name into the bracket-quoted form.
fn bracket_name(table_name: &str) -> String {
    match table_name.split_once('.') {
        Some((schema, table)) => format!("[{}].[{}]", schema, table),
        None => format!("[{}]", table_name),
    }
}

pub async fn direct_test(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DirectTestRequest>,
) -> Json<DirectTestResponse> {
    let table = bracket_name(&payload.table_name);
    let test_queries = vec![
        format!("SELECT TOP 1 * FROM {}", table),
        format!("SELECT COUNT(*) AS row_count FROM {}", table),
    ];

    let mut results = Vec::new();
    for query in test_queries {
        match state.analyzer.warehouse().execute(&query).await {
            Ok(rows) => {
                let first_row_keys = rows
                    .first()
                    .map(|row| row.keys().cloned().collect::<Vec<String>>())
                    .unwrap_or_default();
                results.push(QueryProbe {
                    query,
                    status: "SUCCESS",
                    rows_returned: Some(rows.len()),
                    first_row_keys: Some(first_row_keys),
                    data: Some(rows.into_iter().take(5).collect()),
                    error: None,
                });
            }
            Err(e) => {
                let message: String = e.to_string().chars().take(200).collect();
                results.push(QueryProbe {
                    query,
                    status: "FAILED",
                    rows_returned: None,
                    first_row_keys: None,
                    data: None,
                    error: Some(message),
                });
            }
        }
    }

    Json(DirectTestResponse {
        message: format!("Testing access to '{}'", payload.table_name),
        results,
        recommendation: "Inspect data in successful queries to verify table access",
    })
}

pub async fn inspect_table(
    State(state): State<Arc<AppState>>,
    Path(table_name): Path<String>,
) -> Result<Json<TableInspection>, ApiError> {
    let inspection = state
        .analyzer
        .sampler()
        .inspect(state.analyzer.catalog(), &table_name)
        .await?;
    Ok(Json(inspection))
}

pub async fn database_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DatabaseInfoResponse>, ApiError> {
    let collation = state.analyzer.catalog().collation().await?;

    Ok(Json(DatabaseInfoResponse {
        database: state.config.warehouse.database.clone(),
        collation,
    }))
}

pub async fn debug_query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DebugParams>,
) -> Result<Json<DebugReport>, ApiError> {
    let report = state.analyzer.debug_generation(&params.question).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::bracket_name;

    #[test]
    fn bracket_name_qualifies_dotted_names() {
        assert_eq!(bracket_name("main.devices"), "[main].[devices]");
        assert_eq!(bracket_name("devices"), "[devices]");
    }
}
