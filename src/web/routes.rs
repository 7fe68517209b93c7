use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the analytics pipeline
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::root))
        .nest(
            "/api/fabric",
            Router::new()
                // Analysis
                .route("/smart-analyze", post(handlers::api::smart_analyze))
                .route("/debug", post(handlers::api::debug_query))

                // Table discovery and inspection
                .route("/tables", get(handlers::api::get_tables))
                .route("/list-tables", get(handlers::api::list_all_tables))
                .route("/direct-test", post(handlers::api::direct_test))
                .route("/inspect-table/{table_name}", get(handlers::api::inspect_table))

                // Service status
                .route("/health", get(handlers::api::health_check))
                .route("/database-info", get(handlers::api::database_info)),
        )
}
