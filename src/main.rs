use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use cafeteria_rs::{
    config::StorageBackend,
    create_app, init_observability,
    observability::Metrics,
    repositories::TableManager,
    services::CatalogService,
    shutdown_observability, AppContext, Config, Repositories,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().await?;
    println!("Configuration loaded successfully");

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )?;

    info!("Starting cafeteria-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!(
        "Storage backend: {}, default balance: {}",
        config.database.storage_backend, config.wallet.default_balance
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    let (repositories, table_manager) = match config.database.storage_backend {
        StorageBackend::DynamoDb => {
            info!("Region: {}", config.aws.region);
            info!(
                "DynamoDB Tables: wallets={}, orders={}, menu={}, specials={}",
                config.database.wallets_table_name,
                config.database.orders_table_name,
                config.database.menu_table_name,
                config.database.specials_table_name
            );
            let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());
            let table_manager = Arc::new(TableManager::new(dynamodb_client.clone()));
            (
                Repositories::dynamodb(dynamodb_client, &config.database),
                Some(table_manager),
            )
        }
        StorageBackend::Memory => {
            let repositories = Repositories::in_memory();
            // nothing else would ever populate an in-memory catalog
            let summary = CatalogService::new(repositories.catalog.clone())
                .seed_catalog()
                .await?;
            info!(
                menu_items = summary.menu_items,
                specials = summary.specials,
                "In-memory catalog seeded"
            );
            (repositories, None)
        }
    };
    info!("Repositories initialized successfully");

    let app = create_app(AppContext {
        repositories,
        wallet: config.wallet.clone(),
        tables: config.database.tables(),
        table_manager,
        metrics,
        max_request_size: config.server.max_request_size,
    });

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
