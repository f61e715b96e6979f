use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MealType, OrderStatus};

/// A placed cafeteria order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub student_id: String,
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
}

/// One priced line of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub meal_type: MealType,
    pub item_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Request body for `POST /cafeteria/order`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

impl Order {
    /// Create a pending order stamped with the current time
    pub fn new(student_id: String, items: Vec<OrderItem>, total_amount: Decimal) -> Self {
        Self {
            order_id: Uuid::new_v4().to_string(),
            student_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            order_date: Utc::now(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl OrderItem {
    pub fn new(meal_type: MealType, item_name: impl Into<String>, price: Decimal) -> Self {
        Self {
            meal_type,
            item_name: item_name.into(),
            price,
        }
    }
}

impl PlaceOrderRequest {
    /// Sum of the submitted item prices
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|item| item.price).sum()
    }

    pub fn total_matches_items(&self) -> bool {
        self.items_total() == self.total_amount
    }
}
