use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use fabric_analytics::analyze::Analyzer;
use fabric_analytics::config::WarehouseConfig;
use fabric_analytics::error::AnalyticsError;
use fabric_analytics::llm::{ChatModel, LlmError, LlmManager};
use fabric_analytics::warehouse::duckdb::DuckDbWarehouse;
use fabric_analytics::warehouse::Warehouse;

/// Chat model that replays scripted replies and records every prompt.
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

/// Local newtype so the foreign `ChatModel` trait can be implemented for a
/// shared handle without tripping the orphan rule.
struct SharedModel(Arc<ScriptedModel>);

#[async_trait]
impl ChatModel for SharedModel {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String, LlmError> {
        self.0.prompts.lock().unwrap().push(prompt.to_string());
        self.0
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ResponseError("script exhausted".to_string()))
    }
}

fn seed_warehouse(dir: &tempfile::TempDir) -> String {
    let db_path = dir
        .path()
        .join("warehouse.duckdb")
        .to_string_lossy()
        .to_string();

    let conn = duckdb::Connection::open(&db_path).expect("open seed database");
    conn.execute_batch(
        "CREATE TABLE devices (\"DeviceID\" INTEGER, \"Device Name\" VARCHAR, \"Endpoint_protection\" INTEGER);\n\
         INSERT INTO devices VALUES (1, 'alpha', 0), (2, 'beta', 0), (3, 'gamma', 1);",
    )
    .expect("seed devices table");

    db_path
}

fn analyzer_for(db_path: &str, model: Arc<ScriptedModel>) -> Analyzer {
    let warehouse = Arc::new(DuckDbWarehouse::new(&WarehouseConfig {
        database: db_path.to_string(),
        connect_timeout_secs: 30,
    }));
    let llm = Arc::new(LlmManager::from_model(Box::new(SharedModel(model))));
    Analyzer::new(warehouse, llm)
}

#[tokio::test]
async fn listing_question_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&[
        "```sql\nSELECT [DeviceID], [Device Name] FROM [main].[devices] WHERE [Endpoint_protection] = 0\n```",
        "1. Device: [DeviceID: 1, Device Name: alpha]\n2. Device: [DeviceID: 2, Device Name: beta]",
    ]);
    let analyzer = analyzer_for(&db_path, model.clone());

    let report = analyzer
        .smart_analyze("list unprotected devices", 5)
        .await
        .expect("pipeline should succeed");

    assert_eq!(
        report.generated_sql,
        "SELECT TOP 5 [DeviceID], [Device Name] FROM [main].[devices] WHERE [Endpoint_protection] = 0"
    );
    assert_eq!(report.result_count, 2);
    assert!(report.analysis.starts_with("1. Device:"));

    // Second call is the summarization; listing questions get the
    // numbered-list template.
    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("numbered list"));
}

#[tokio::test]
async fn count_question_uses_direct_template() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&[
        "SELECT COUNT(*) AS device_count FROM [main].[devices]",
        "There are 3 devices.",
    ]);
    let analyzer = analyzer_for(&db_path, model.clone());

    let report = analyzer
        .smart_analyze("how many devices are there", 10)
        .await
        .expect("pipeline should succeed");

    assert_eq!(report.result_count, 1);
    assert_eq!(report.analysis, "There are 3 devices.");

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("directly and concisely"));
    assert!(prompts[1].contains("device_count"));
}

#[tokio::test]
async fn non_select_output_is_rejected_and_never_executed() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&["DROP TABLE devices"]);
    let analyzer = analyzer_for(&db_path, model);

    let err = analyzer
        .smart_analyze("delete everything", 10)
        .await
        .expect_err("non-SELECT must be rejected");
    assert_eq!(err.kind(), "generated-sql-invalid");

    // The table must still be there.
    let rows = analyzer
        .warehouse()
        .execute("SELECT TOP 1 * FROM [main].[devices]")
        .await
        .expect("devices table should survive");
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unknown_table_reference_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&["SELECT * FROM [main].[nonexistent]"]);
    let analyzer = analyzer_for(&db_path, model);

    let err = analyzer
        .smart_analyze("show me the nonexistent table", 10)
        .await
        .expect_err("unknown table must be rejected");
    assert_eq!(err.kind(), "generated-sql-invalid");
}

#[tokio::test]
async fn insufficient_data_triggers_exactly_one_relaxed_retry() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&[
        "INSUFFICIENT_DATA",
        "SELECT [DeviceID] FROM [main].[devices]",
        "All three devices are listed.",
    ]);
    let analyzer = analyzer_for(&db_path, model.clone());

    let report = analyzer
        .smart_analyze("list devices", 10)
        .await
        .expect("relaxed retry should succeed");
    assert_eq!(report.result_count, 3);

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[0].contains("If uncertain, attempt a query"));
    assert!(prompts[1].contains("Make a best-guess query"));
}

#[tokio::test]
async fn empty_result_skips_summarization_and_suggests() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&[
        "SELECT * FROM [main].[devices] WHERE [Endpoint_protection] = 99",
    ]);
    let analyzer = analyzer_for(&db_path, model.clone());

    let report = analyzer
        .smart_analyze("show devices with protection level 99", 10)
        .await
        .expect("empty result is not an error");

    assert_eq!(report.result_count, 0);
    assert_eq!(report.analysis, "Query executed but returned no results");
    let suggestions = report.suggestions.expect("suggestions expected");
    assert!(!suggestions.is_empty());

    // Only the generation call happened.
    assert_eq!(model.prompts().len(), 1);
}

#[tokio::test]
async fn existing_top_clause_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let model = ScriptedModel::new(&[
        "SELECT TOP 2 * FROM [main].[devices]",
        "Two devices shown.",
    ]);
    let analyzer = analyzer_for(&db_path, model);

    let report = analyzer
        .smart_analyze("show two devices", 100)
        .await
        .expect("pipeline should succeed");

    assert_eq!(report.generated_sql, "SELECT TOP 2 * FROM [main].[devices]");
    assert_eq!(report.result_count, 2);
}

#[tokio::test]
async fn dialect_rewrite_executes_on_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let warehouse = DuckDbWarehouse::new(&WarehouseConfig {
        database: db_path,
        connect_timeout_secs: 30,
    });

    let rows = warehouse
        .execute("SELECT TOP 3 [Device Name] FROM [main].[devices]")
        .await
        .expect("surface dialect should execute after rewrite");
    assert_eq!(rows.len(), 3);
    assert!(rows[0].contains_key("Device Name"));
}

#[tokio::test]
async fn broken_warehouse_surfaces_connection_failed() {
    let dir = tempfile::tempdir().unwrap();
    // A directory is not a database file; opening it fails.
    let bad_path = dir.path().to_string_lossy().to_string();

    let model = ScriptedModel::new(&[]);
    let analyzer = analyzer_for(&bad_path, model);

    let err = analyzer
        .smart_analyze("list devices", 10)
        .await
        .expect_err("broken warehouse must error");
    assert_eq!(err.kind(), "connection-failed");
}

#[tokio::test]
async fn query_failure_reports_attempted_sql() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = seed_warehouse(&dir);

    let warehouse = DuckDbWarehouse::new(&WarehouseConfig {
        database: db_path,
        connect_timeout_secs: 30,
    });

    let err = warehouse
        .execute("SELECT [missing_column] FROM [main].[devices]")
        .await
        .expect_err("bad column must fail");

    match err {
        AnalyticsError::QueryFailed { sql, .. } => {
            assert!(sql.contains("missing_column"));
        }
        other => panic!("expected QueryFailed, got {:?}", other),
    }
}
