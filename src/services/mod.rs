// Services module - business logic layer

pub mod catalog_service;
pub mod order_service;
pub mod wallet_service;

pub use catalog_service::{CatalogService, CatalogSnapshot, SeedSummary};
pub use order_service::OrderService;
pub use wallet_service::WalletService;
