use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_ssm::Client as SsmClient;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::repositories::CafeteriaTables;

const ENV_PREFIX: &str = "CAFETERIA";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    #[error("AWS SDK error: {source}")]
    AwsSdk {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub wallet: WalletConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
}

/// Where wallets, orders and the catalog are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    DynamoDb,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::DynamoDb => write!(f, "dynamodb"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dynamodb" => Ok(StorageBackend::DynamoDb),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_wallets_table")]
    pub wallets_table_name: String,
    #[serde(default = "default_orders_table")]
    pub orders_table_name: String,
    #[serde(default = "default_menu_table")]
    pub menu_table_name: String,
    #[serde(default = "default_specials_table")]
    pub specials_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub storage_backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_balance")]
    pub default_balance: Decimal,
    #[serde(default = "default_max_top_up")]
    pub max_top_up: Decimal,
    #[serde(default = "default_verify_catalog_prices")]
    pub verify_catalog_prices: bool,
    /// SSM parameter holding an override for `default_balance`
    #[serde(default)]
    pub default_balance_parameter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

pub struct ParameterStoreConfig {
    ssm_client: SsmClient,
    cache: Arc<RwLock<HashMap<String, (String, Instant)>>>,
    cache_ttl: Duration,
}

impl fmt::Debug for ParameterStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterStoreConfig")
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_size", &"<runtime>")
            .finish()
    }
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let mut wallet = WalletConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .load()
            .await;

        let dynamodb_client = DynamoDbClient::new(&aws_config);
        let ssm_client = SsmClient::new(&aws_config);

        let parameter_store =
            ParameterStoreConfig::new(ssm_client, Duration::from_secs(5 * 60));

        if let Some(name) = wallet.default_balance_parameter.clone() {
            wallet.default_balance = parameter_store
                .get_decimal_with_default(&name, wallet.default_balance)
                .await?;
            info!(
                parameter = %name,
                default_balance = %wallet.default_balance,
                "Default balance resolved from Parameter Store"
            );
        }

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client,
        };

        let config = Config {
            server,
            database,
            wallet,
            aws,
            observability,
        };

        config.validate()?;
        if config.database.storage_backend == StorageBackend::DynamoDb {
            config.check_aws_connectivity().await;
        }

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.wallet.validate()
    }

    async fn check_aws_connectivity(&self) {
        match self
            .aws
            .dynamodb_client
            .describe_table()
            .table_name(&self.database.wallets_table_name)
            .send()
            .await
        {
            Ok(_) => info!("AWS DynamoDB connectivity validated"),
            // tables may legitimately not exist before setup-tables runs
            Err(e) => warn!("AWS DynamoDB connectivity test failed: {}", e),
        }
    }
}

fn load_section<T: DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("server")
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.max_request_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "Max request size cannot be 0".to_string(),
            });
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("database")
    }

    pub fn tables(&self) -> CafeteriaTables {
        CafeteriaTables {
            wallets: self.wallets_table_name.clone(),
            orders: self.orders_table_name.clone(),
            menu: self.menu_table_name.clone(),
            specials: self.specials_table_name.clone(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let tables = self.tables().all();

        if tables.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::ValidationError {
                message: "Table names cannot be empty".to_string(),
            });
        }

        let mut unique = tables.clone();
        unique.sort();
        unique.dedup();
        if unique.len() != tables.len() {
            return Err(ConfigError::ValidationError {
                message: "Table names must be distinct".to_string(),
            });
        }

        Ok(())
    }
}

impl WalletConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("wallet")
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_balance < Decimal::ZERO {
            return Err(ConfigError::ValidationError {
                message: "Default balance cannot be negative".to_string(),
            });
        }

        if self.max_top_up <= Decimal::ZERO {
            return Err(ConfigError::ValidationError {
                message: "Max top-up must be positive".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_balance: default_balance(),
            max_top_up: default_max_top_up(),
            verify_catalog_prices: default_verify_catalog_prices(),
            default_balance_parameter: None,
        }
    }
}

impl ObservabilityConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        load_section("observability")
    }
}

impl ParameterStoreConfig {
    pub fn new(ssm_client: SsmClient, cache_ttl: Duration) -> Self {
        Self {
            ssm_client,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl,
        }
    }

    pub async fn get_parameter(&self, name: &str) -> Result<String, ConfigError> {
        debug!("Getting parameter: {}", name);

        {
            let cache = self.cache.read().await;
            if let Some((value, timestamp)) = cache.get(name) {
                if timestamp.elapsed() < self.cache_ttl {
                    debug!("Parameter found in cache: {}", name);
                    return Ok(value.clone());
                }
                debug!("Parameter cache expired: {}", name);
            }
        }

        debug!("Fetching parameter from AWS SSM: {}", name);
        let result = self
            .ssm_client
            .get_parameter()
            .name(name)
            .with_decryption(false)
            .send()
            .await
            .map_err(|e| ConfigError::AwsSdk {
                source: Box::new(e),
            })?;

        let value = result
            .parameter()
            .and_then(|p| p.value())
            .ok_or_else(|| ConfigError::ParameterNotFound {
                name: name.to_string(),
            })?
            .to_string();

        self.cache
            .write()
            .await
            .insert(name.to_string(), (value.clone(), Instant::now()));

        debug!("Parameter retrieved and cached: {}", name);
        Ok(value)
    }

    pub async fn get_parameter_with_default(&self, name: &str, default: &str) -> String {
        match self.get_parameter(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to get parameter {}, using default: {}", name, e);
                default.to_string()
            }
        }
    }

    /// Numeric parameter; an unreachable parameter falls back to `default`,
    /// a present but malformed one is an error
    pub async fn get_decimal_with_default(
        &self,
        name: &str,
        default: Decimal,
    ) -> Result<Decimal, ConfigError> {
        let raw = self
            .get_parameter_with_default(name, &default.to_string())
            .await;
        parse_decimal_parameter(name, &raw)
    }

    #[cfg(test)]
    pub(crate) async fn cache_size(&self) -> usize {
        self.cache.read().await.len()
    }
}

pub(crate) fn parse_decimal_parameter(name: &str, raw: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(raw.trim()).map_err(|e| ConfigError::ValidationError {
        message: format!("Parameter {} is not a valid amount ({}): {}", name, raw, e),
    })
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_max_request_size() -> usize {
    64 * 1024
}

pub(crate) fn default_wallets_table() -> String {
    "CafeteriaWallets".to_string()
}

pub(crate) fn default_orders_table() -> String {
    "CafeteriaOrders".to_string()
}

pub(crate) fn default_menu_table() -> String {
    "CafeteriaMenu".to_string()
}

pub(crate) fn default_specials_table() -> String {
    "CafeteriaSpecials".to_string()
}

pub(crate) fn default_region() -> String {
    "us-west-2".to_string()
}

pub(crate) fn default_balance() -> Decimal {
    dec!(250)
}

pub(crate) fn default_max_top_up() -> Decimal {
    dec!(5000)
}

pub(crate) fn default_verify_catalog_prices() -> bool {
    true
}

pub(crate) fn default_service_name() -> String {
    "cafeteria-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
