use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::repositories::{CafeteriaTables, TableManager};
use crate::services::CatalogService;

/// Admin state containing services
#[derive(Clone)]
pub struct AdminState {
    pub catalog_service: Arc<CatalogService>,
    /// Absent when the service runs on in-memory storage
    pub table_manager: Option<Arc<TableManager>>,
    pub tables: CafeteriaTables,
}

/// Response for seeding operations
#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub message: String,
    pub menu_items: usize,
    pub specials: usize,
    pub timestamp: String,
}

/// Response for table setup operations
#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

/// Set up the required DynamoDB tables
#[instrument(name = "setup_tables", skip(state), fields(
    wallets_table = %state.tables.wallets,
    orders_table = %state.tables.orders,
))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<SetupTablesResponse>, (StatusCode, Json<Value>)> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let Some(table_manager) = state.table_manager.as_ref() else {
        info!("In-memory storage, no tables to create");
        return Ok(Json(SetupTablesResponse {
            message: "In-memory storage, no tables to create".to_string(),
            tables_created: Vec::new(),
            timestamp,
        }));
    };

    info!("Setting up DynamoDB tables");

    match table_manager.create_all_tables(&state.tables).await {
        Ok(()) => {
            let tables_created = state.tables.all();

            info!("Successfully created tables: {:?}", tables_created);

            Ok(Json(SetupTablesResponse {
                message: format!("Successfully created {} tables", tables_created.len()),
                tables_created,
                timestamp,
            }))
        }
        Err(err) => {
            error!("Failed to create tables: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to create tables",
                    "message": "Internal server error",
                    "timestamp": timestamp,
                })),
            ))
        }
    }
}

/// Load the standard menu and specials, updating entries that already exist
#[instrument(name = "seed_catalog", skip(state), fields(
    menu_table = %state.tables.menu,
    specials_table = %state.tables.specials,
))]
pub async fn seed_catalog(
    State(state): State<AdminState>,
) -> Result<Json<SeedResponse>, (StatusCode, Json<Value>)> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    info!("Seeding catalog");

    match state.catalog_service.seed_catalog().await {
        Ok(summary) => {
            info!(
                menu_items = summary.menu_items,
                specials = summary.specials,
                "Catalog seeded"
            );
            Ok(Json(SeedResponse {
                message: format!(
                    "Seeded {} menu items and {} specials",
                    summary.menu_items, summary.specials
                ),
                menu_items: summary.menu_items,
                specials: summary.specials,
                timestamp,
            }))
        }
        Err(err) => {
            error!("Failed to seed catalog: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to seed catalog",
                    "message": "Internal server error",
                    "timestamp": timestamp,
                })),
            ))
        }
    }
}
