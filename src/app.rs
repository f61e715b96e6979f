use aws_sdk_dynamodb::Client as DynamoDbClient;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::config::{
    default_menu_table, default_orders_table, default_specials_table, default_wallets_table,
    DatabaseConfig, WalletConfig,
};
use crate::handlers::{
    admin, api, cors_middleware, health_check, metrics_handler, request_validation_middleware,
    security_headers_middleware,
};
use crate::observability::{observability_middleware, BusinessTracingMiddleware, Metrics};
use crate::repositories::{
    CafeteriaTables, CatalogRepository, DynamoDbCatalogRepository, DynamoDbOrderRepository,
    DynamoDbWalletRepository, InMemoryCatalogRepository, InMemoryOrderRepository,
    InMemoryWalletRepository, OrderRepository, TableManager, WalletRepository,
};
use crate::services::{CatalogService, OrderService, WalletService};

/// The three stores backing the service
#[derive(Clone)]
pub struct Repositories {
    pub wallets: Arc<dyn WalletRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
}

impl Repositories {
    pub fn dynamodb(client: Arc<DynamoDbClient>, database: &DatabaseConfig) -> Self {
        Self {
            wallets: Arc::new(DynamoDbWalletRepository::new(
                client.clone(),
                database.wallets_table_name.clone(),
                database.region.clone(),
            )),
            orders: Arc::new(DynamoDbOrderRepository::new(
                client.clone(),
                database.orders_table_name.clone(),
                database.region.clone(),
            )),
            catalog: Arc::new(DynamoDbCatalogRepository::new(
                client,
                database.menu_table_name.clone(),
                database.specials_table_name.clone(),
                database.region.clone(),
            )),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            wallets: Arc::new(InMemoryWalletRepository::new()),
            orders: Arc::new(InMemoryOrderRepository::new()),
            catalog: Arc::new(InMemoryCatalogRepository::new()),
        }
    }
}

/// Everything needed to assemble the router
pub struct AppContext {
    pub repositories: Repositories,
    pub wallet: WalletConfig,
    pub tables: CafeteriaTables,
    /// Only present for the DynamoDB backend
    pub table_manager: Option<Arc<TableManager>>,
    pub metrics: Arc<Metrics>,
    pub max_request_size: usize,
}

impl AppContext {
    /// In-memory stores with default wallet settings
    pub fn in_memory(metrics: Arc<Metrics>) -> Self {
        Self {
            repositories: Repositories::in_memory(),
            wallet: WalletConfig::default(),
            tables: CafeteriaTables {
                wallets: default_wallets_table(),
                orders: default_orders_table(),
                menu: default_menu_table(),
                specials: default_specials_table(),
            },
            table_manager: None,
            metrics,
            max_request_size: crate::config::default_max_request_size(),
        }
    }
}

/// Build the services and the full HTTP router
pub fn create_app(context: AppContext) -> Router {
    let AppContext {
        repositories,
        wallet,
        tables,
        table_manager,
        metrics,
        max_request_size,
    } = context;

    let wallet_service = Arc::new(WalletService::new(
        repositories.wallets,
        wallet.default_balance,
        wallet.max_top_up,
    ));
    let catalog_service = Arc::new(CatalogService::new(repositories.catalog));
    let order_service = Arc::new(OrderService::new(
        wallet_service.clone(),
        catalog_service.clone(),
        repositories.orders,
        wallet.verify_catalog_prices,
    ));

    let api_state = api::ApiState {
        wallet_service,
        order_service,
        catalog_service: catalog_service.clone(),
        tracing: Arc::new(BusinessTracingMiddleware::new(metrics.clone())),
    };

    let admin_state = admin::AdminState {
        catalog_service,
        table_manager,
        tables,
    };

    let metrics_for_middleware = metrics.clone();

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .route("/cafeteria/menu", get(api::list_menu))
        .route("/cafeteria/specials", get(api::list_specials))
        .route("/cafeteria/wallet", get(api::get_wallet))
        .route("/cafeteria/wallet/add", post(api::add_money))
        .route("/cafeteria/wallet/history", get(api::wallet_history))
        .route("/cafeteria/order", post(api::place_order))
        .route("/cafeteria/orders", get(api::list_orders))
        .with_state(api_state)
        .route("/api/admin/setup-tables", post(admin::setup_tables))
        .route("/api/admin/seed", post(admin::seed_catalog))
        .with_state(admin_state)
        // outermost layer last
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(move |req, next| {
            request_validation_middleware(max_request_size, req, next)
        }))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
