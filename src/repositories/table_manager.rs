use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    Projection, ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::dynamodb::map_dynamodb_error;
use super::order_repository::student_index_name;
use crate::models::{RepositoryError, RepositoryResult};

/// Names of every table the service owns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CafeteriaTables {
    pub wallets: String,
    pub orders: String,
    pub menu: String,
    pub specials: String,
}

impl CafeteriaTables {
    pub fn all(&self) -> Vec<String> {
        vec![
            self.wallets.clone(),
            self.orders.clone(),
            self.menu.clone(),
            self.specials.clone(),
        ]
    }
}

/// Manages DynamoDB table creation and configuration
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    poll_interval: Duration,
    max_polls: u32,
}

impl TableManager {
    /// Create a new table manager
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(10),
            max_polls: 30,
        }
    }

    /// Create the wallets table, keyed by student
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_wallets_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_simple_table(table_name, "student_id").await
    }

    /// Create a catalog table (menu items or specials), keyed by id
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_catalog_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_simple_table(table_name, "id").await
    }

    /// Create the orders table with the per-student history index
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_orders_table(&self, table_name: &str) -> RepositoryResult<()> {
        info!("Creating orders table");

        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        let student_gsi = GlobalSecondaryIndex::builder()
            .index_name(student_index_name(table_name))
            .key_schema(key_element("student_id", KeyType::Hash)?)
            .key_schema(key_element("order_date", KeyType::Range)?)
            .projection(
                Projection::builder()
                    .projection_type(ProjectionType::All)
                    .build(),
            )
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build GSI: {}", e),
            })?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(attribute_definition("order_id")?)
            .attribute_definitions(attribute_definition("student_id")?)
            .attribute_definitions(attribute_definition("order_date")?)
            .key_schema(key_element("order_id", KeyType::Hash)?)
            .global_secondary_indexes(student_gsi)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_dynamodb_error(e.into()))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Orders table created successfully");

        Ok(())
    }

    async fn create_simple_table(&self, table_name: &str, hash_key: &str) -> RepositoryResult<()> {
        info!("Creating table keyed by {}", hash_key);

        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(attribute_definition(hash_key)?)
            .key_schema(key_element(hash_key, KeyType::Hash)?)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| map_dynamodb_error(e.into()))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => {
                info!("Table {} exists", table_name);
                Ok(true)
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                } else {
                    error!("Error checking table existence: {}", service_error);
                    Err(RepositoryError::ConnectionFailed)
                }
            }
        }
    }

    /// Wait for a table to become active
    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for _ in 0..self.max_polls {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| {
                    error!("Error checking table status: {}", e);
                    map_dynamodb_error(e.into())
                })?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }

    /// Create every table the service needs
    #[instrument(skip(self))]
    pub async fn create_all_tables(&self, tables: &CafeteriaTables) -> RepositoryResult<()> {
        info!("Creating all tables");

        let (wallets, orders, menu, specials) = tokio::join!(
            self.create_wallets_table(&tables.wallets),
            self.create_orders_table(&tables.orders),
            self.create_catalog_table(&tables.menu),
            self.create_catalog_table(&tables.specials),
        );
        wallets?;
        orders?;
        menu?;
        specials?;

        info!("All tables created successfully");
        Ok(())
    }
}

fn attribute_definition(name: &str) -> RepositoryResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build attribute definition: {}", e),
        })
}

fn key_element(name: &str, key_type: KeyType) -> RepositoryResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| RepositoryError::AwsSdk {
            message: format!("Failed to build key schema: {}", e),
        })
}
