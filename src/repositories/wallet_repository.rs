use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    decimal_attr, dynamodb_span, get_decimal, get_list, get_string, get_timestamp,
    map_dynamodb_error, timestamp_attr, Item,
};
use crate::models::{
    RepositoryError, RepositoryResult, TransactionType, Wallet, WalletTransaction,
};

/// Data access for student wallets.
///
/// Mutations are single atomic operations on the stored record so that
/// concurrent requests against one wallet cannot lose updates or overdraw it.
#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Find a wallet by student ID
    async fn find_wallet(&self, student_id: &str) -> RepositoryResult<Option<Wallet>>;

    /// Store `wallet` unless the student already has one; returns whichever
    /// wallet is stored afterwards
    async fn create_wallet_if_absent(&self, wallet: Wallet) -> RepositoryResult<Wallet>;

    /// Add the entry amount to the balance and append the entry.
    /// Fails with `NotFound` if the wallet does not exist.
    async fn apply_credit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet>;

    /// Subtract the entry amount and append the entry only if the wallet
    /// exists and its balance covers the amount; `ConditionalCheckFailed`
    /// otherwise, with nothing written.
    async fn apply_debit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet>;
}

/// DynamoDB implementation of the WalletRepository trait
pub struct DynamoDbWalletRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbWalletRepository {
    /// Create a new DynamoDB wallet repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a Wallet struct to DynamoDB attribute values
    pub fn wallet_to_item(&self, wallet: &Wallet) -> Item {
        let mut item = HashMap::new();

        item.insert(
            "student_id".to_string(),
            AttributeValue::S(wallet.student_id.clone()),
        );
        item.insert("balance".to_string(), decimal_attr(&wallet.balance));
        item.insert(
            "initial_balance".to_string(),
            decimal_attr(&wallet.initial_balance),
        );
        item.insert(
            "transactions".to_string(),
            AttributeValue::L(wallet.transactions.iter().map(transaction_to_attr).collect()),
        );
        item.insert("created_at".to_string(), timestamp_attr(&wallet.created_at));
        item.insert("updated_at".to_string(), timestamp_attr(&wallet.updated_at));

        item
    }

    /// Convert DynamoDB item to Wallet struct
    pub fn item_to_wallet(&self, item: &Item) -> RepositoryResult<Wallet> {
        let transactions = get_list(item, "transactions")
            .iter()
            .map(|attr| {
                attr.as_m()
                    .map_err(|_| RepositoryError::InvalidRecord {
                        message: "Ledger entry is not a map".to_string(),
                    })
                    .and_then(attr_to_transaction)
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        let created_at = get_timestamp(item, "created_at")?;

        Ok(Wallet {
            student_id: get_string(item, "student_id")?,
            balance: get_decimal(item, "balance")?,
            initial_balance: get_decimal(item, "initial_balance")?,
            transactions,
            created_at,
            updated_at: get_timestamp(item, "updated_at").unwrap_or(created_at),
        })
    }

    /// Shared conditional update for credits and debits
    async fn apply_entry(
        &self,
        student_id: &str,
        entry: &WalletTransaction,
        update_expression: &str,
        condition_expression: &str,
    ) -> RepositoryResult<Wallet> {
        let update_span = dynamodb_span(&self.table_name, &self.region, "UpdateItem");

        let response = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("student_id", AttributeValue::S(student_id.to_string()))
                .update_expression(update_expression)
                .condition_expression(condition_expression)
                .expression_attribute_values(":amount", decimal_attr(&entry.amount))
                .expression_attribute_values(
                    ":entry",
                    AttributeValue::L(vec![transaction_to_attr(entry)]),
                )
                .expression_attribute_values(":now", timestamp_attr(&entry.timestamp))
                .return_values(ReturnValue::AllNew)
                .send()
                .await
                .map_err(|e| {
                    let service_error = e.into_service_error();
                    if service_error.is_conditional_check_failed_exception() {
                        RepositoryError::ConditionalCheckFailed
                    } else {
                        map_dynamodb_error(service_error.into())
                    }
                })
        }
        .instrument(update_span)
        .await?;

        let attributes = response.attributes.ok_or_else(|| RepositoryError::InvalidRecord {
            message: "UpdateItem returned no attributes".to_string(),
        })?;
        self.item_to_wallet(&attributes)
    }
}

fn transaction_to_attr(entry: &WalletTransaction) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert(
        "type".to_string(),
        AttributeValue::S(entry.transaction_type.to_string()),
    );
    map.insert("amount".to_string(), decimal_attr(&entry.amount));
    map.insert(
        "description".to_string(),
        AttributeValue::S(entry.description.clone()),
    );
    map.insert("timestamp".to_string(), timestamp_attr(&entry.timestamp));
    AttributeValue::M(map)
}

fn attr_to_transaction(map: &Item) -> RepositoryResult<WalletTransaction> {
    let transaction_type: TransactionType = get_string(map, "type")?
        .parse()
        .map_err(|message| RepositoryError::InvalidRecord { message })?;

    Ok(WalletTransaction {
        transaction_type,
        amount: get_decimal(map, "amount")?,
        description: get_string(map, "description")?,
        timestamp: get_timestamp(map, "timestamp")?,
    })
}

#[async_trait]
impl WalletRepository for DynamoDbWalletRepository {
    #[instrument(skip(self), fields(table = %self.table_name, student_id = %student_id))]
    async fn find_wallet(&self, student_id: &str) -> RepositoryResult<Option<Wallet>> {
        info!("Finding wallet for student");

        let get_span = dynamodb_span(&self.table_name, &self.region, "GetItem");

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("student_id", AttributeValue::S(student_id.to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => {
                let wallet = self.item_to_wallet(&item)?;
                info!("Wallet found with {} transactions", wallet.transactions.len());
                Ok(Some(wallet))
            }
            None => {
                info!("Wallet not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, wallet), fields(table = %self.table_name, student_id = %wallet.student_id))]
    async fn create_wallet_if_absent(&self, wallet: Wallet) -> RepositoryResult<Wallet> {
        info!("Creating wallet");

        let item = self.wallet_to_item(&wallet);
        let put_span = dynamodb_span(&self.table_name, &self.region, "PutItem");

        let result = async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(student_id)")
                .send()
                .await
        }
        .instrument(put_span)
        .await;

        match result {
            Ok(_) => {
                info!("Wallet created successfully");
                Ok(wallet)
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_conditional_check_failed_exception() {
                    return Err(map_dynamodb_error(service_error.into()));
                }

                warn!("Wallet already exists, returning stored record");
                self.find_wallet(&wallet.student_id)
                    .await?
                    .ok_or(RepositoryError::NotFound)
            }
        }
    }

    #[instrument(skip(self, entry), fields(table = %self.table_name, student_id = %student_id, amount = %entry.amount))]
    async fn apply_credit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet> {
        info!("Applying credit");

        self.apply_entry(
            student_id,
            &entry,
            "SET balance = balance + :amount, transactions = list_append(transactions, :entry), updated_at = :now",
            "attribute_exists(student_id)",
        )
        .await
        .map_err(|e| match e {
            RepositoryError::ConditionalCheckFailed => RepositoryError::NotFound,
            other => other,
        })
    }

    #[instrument(skip(self, entry), fields(table = %self.table_name, student_id = %student_id, amount = %entry.amount))]
    async fn apply_debit(
        &self,
        student_id: &str,
        entry: WalletTransaction,
    ) -> RepositoryResult<Wallet> {
        info!("Applying debit");

        self.apply_entry(
            student_id,
            &entry,
            "SET balance = balance - :amount, transactions = list_append(transactions, :entry), updated_at = :now",
            "attribute_exists(student_id) AND balance >= :amount",
        )
        .await
    }
}
