use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

use super::dynamodb::{
    decimal_attr, dynamodb_span, get_decimal, get_list, get_string, get_timestamp,
    map_dynamodb_error, timestamp_attr, Item,
};
use crate::models::{MealType, Order, OrderItem, OrderStatus, RepositoryError, RepositoryResult};

/// Trait defining the interface for order data access operations
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a newly placed order
    async fn create_order(&self, order: Order) -> RepositoryResult<Order>;

    /// All orders for a student, newest first
    async fn find_orders_by_student(&self, student_id: &str) -> RepositoryResult<Vec<Order>>;
}

/// DynamoDB implementation of the OrderRepository trait
pub struct DynamoDbOrderRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    student_index: String,
    region: String,
}

impl DynamoDbOrderRepository {
    /// Create a new DynamoDB order repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        let student_index = student_index_name(&table_name);
        Self {
            client,
            table_name,
            student_index,
            region,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert an Order struct to DynamoDB attribute values
    pub fn order_to_item(&self, order: &Order) -> Item {
        let mut item = HashMap::new();

        item.insert(
            "order_id".to_string(),
            AttributeValue::S(order.order_id.clone()),
        );
        item.insert(
            "student_id".to_string(),
            AttributeValue::S(order.student_id.clone()),
        );

        let items: Vec<AttributeValue> = order
            .items
            .iter()
            .map(|line| {
                let mut map = HashMap::new();
                map.insert(
                    "meal_type".to_string(),
                    AttributeValue::S(line.meal_type.to_string()),
                );
                map.insert(
                    "item_name".to_string(),
                    AttributeValue::S(line.item_name.clone()),
                );
                map.insert("price".to_string(), decimal_attr(&line.price));
                AttributeValue::M(map)
            })
            .collect();

        item.insert("items".to_string(), AttributeValue::L(items));
        item.insert("total_amount".to_string(), decimal_attr(&order.total_amount));
        item.insert(
            "status".to_string(),
            AttributeValue::S(order.status.to_string()),
        );
        item.insert("order_date".to_string(), timestamp_attr(&order.order_date));

        item
    }

    /// Convert DynamoDB item to Order struct
    pub fn item_to_order(&self, item: &Item) -> RepositoryResult<Order> {
        let items = get_list(item, "items")
            .iter()
            .map(|attr| -> RepositoryResult<OrderItem> {
                let map = attr.as_m().map_err(|_| RepositoryError::InvalidRecord {
                    message: "Order line is not a map".to_string(),
                })?;
                let meal_type: MealType = get_string(map, "meal_type")?
                    .parse()
                    .map_err(|message| RepositoryError::InvalidRecord { message })?;
                Ok(OrderItem {
                    meal_type,
                    item_name: get_string(map, "item_name")?,
                    price: get_decimal(map, "price")?,
                })
            })
            .collect::<RepositoryResult<Vec<_>>>()?;

        let status: OrderStatus = get_string(item, "status")?
            .parse()
            .map_err(|message| RepositoryError::InvalidRecord { message })?;

        Ok(Order {
            order_id: get_string(item, "order_id")?,
            student_id: get_string(item, "student_id")?,
            items,
            total_amount: get_decimal(item, "total_amount")?,
            status,
            order_date: get_timestamp(item, "order_date")?,
        })
    }
}

/// Name of the GSI keyed by (student_id, order_date)
pub fn student_index_name(table_name: &str) -> String {
    format!("{}-StudentIndex", table_name)
}

#[async_trait]
impl OrderRepository for DynamoDbOrderRepository {
    #[instrument(skip(self, order), fields(table = %self.table_name, order_id = %order.order_id, student_id = %order.student_id))]
    async fn create_order(&self, order: Order) -> RepositoryResult<Order> {
        info!("Creating order");

        let item = self.order_to_item(&order);
        let put_span = dynamodb_span(&self.table_name, &self.region, "PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(order_id)")
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!("Order created successfully");
        Ok(order)
    }

    #[instrument(skip(self), fields(table = %self.table_name, student_id = %student_id))]
    async fn find_orders_by_student(&self, student_id: &str) -> RepositoryResult<Vec<Order>> {
        info!("Finding orders for student");

        let mut orders = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let query_span = dynamodb_span(&self.table_name, &self.region, "Query");

            let response = async {
                self.client
                    .query()
                    .table_name(&self.table_name)
                    .index_name(&self.student_index)
                    .key_condition_expression("student_id = :student_id")
                    .expression_attribute_values(
                        ":student_id",
                        AttributeValue::S(student_id.to_string()),
                    )
                    .scan_index_forward(false)
                    .set_exclusive_start_key(exclusive_start_key.take())
                    .send()
                    .await
                    .map_err(|e| map_dynamodb_error(e.into()))
            }
            .instrument(query_span)
            .await?;

            for item in response.items.unwrap_or_default() {
                match self.item_to_order(&item) {
                    Ok(order) => orders.push(order),
                    Err(e) => {
                        warn!("Failed to parse order item: {}", e);
                        continue;
                    }
                }
            }

            match response.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));

        info!("Found {} orders", orders.len());
        Ok(orders)
    }
}
