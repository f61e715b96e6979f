// Repositories module - data access layer

pub mod catalog_repository;
mod dynamodb;
pub mod memory;
pub mod order_repository;
pub mod table_manager;
pub mod wallet_repository;


pub use catalog_repository::{CatalogRepository, DynamoDbCatalogRepository};
pub use memory::{InMemoryCatalogRepository, InMemoryOrderRepository, InMemoryWalletRepository};
pub use order_repository::{DynamoDbOrderRepository, OrderRepository};
pub use table_manager::{CafeteriaTables, TableManager};
pub use wallet_repository::{DynamoDbWalletRepository, WalletRepository};
