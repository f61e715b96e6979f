use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    validate_student_id, Order, PlaceOrderRequest, ServiceError, ServiceResult, Validate,
};
use crate::repositories::OrderRepository;
use crate::services::{CatalogService, WalletService};

pub const ORDER_PLACED_DESCRIPTION: &str = "Order placed";
pub const ORDER_REVERSAL_DESCRIPTION: &str = "Order reversal";

/// Service for placing orders against a student's wallet
pub struct OrderService {
    wallet_service: Arc<WalletService>,
    catalog_service: Arc<CatalogService>,
    repository: Arc<dyn OrderRepository>,
    verify_catalog_prices: bool,
}

impl OrderService {
    pub fn new(
        wallet_service: Arc<WalletService>,
        catalog_service: Arc<CatalogService>,
        repository: Arc<dyn OrderRepository>,
        verify_catalog_prices: bool,
    ) -> Self {
        Self {
            wallet_service,
            catalog_service,
            repository,
            verify_catalog_prices,
        }
    }

    /// Debit the wallet for the order total and record a pending order.
    ///
    /// If the order cannot be stored after the debit went through, the same
    /// amount is credited back so no debit is left without an order.
    #[instrument(skip(self, request), fields(student_id = %student_id, total_amount = %request.total_amount, item_count = request.items.len()))]
    pub async fn place_order(
        &self,
        student_id: &str,
        request: PlaceOrderRequest,
    ) -> ServiceResult<Order> {
        crate::info_with_trace!("Placing order");

        validate_student_id(student_id)?;
        request.validate()?;

        if !request.total_matches_items() {
            crate::warn_with_trace!(
                items_total = %request.items_total(),
                "Order total does not match item prices"
            );
            return Err(ServiceError::ValidationError {
                message: format!(
                    "Total amount {} does not match item prices totalling {}",
                    request.total_amount,
                    request.items_total()
                ),
            });
        }

        if self.verify_catalog_prices {
            self.verify_against_catalog(&request).await?;
        }

        self.wallet_service
            .debit(student_id, request.total_amount, ORDER_PLACED_DESCRIPTION)
            .await?;

        let order = Order::new(student_id.to_string(), request.items, request.total_amount);
        let order_id = order.order_id.clone();

        match self.repository.create_order(order).await {
            Ok(order) => {
                crate::info_with_trace!(order_id = %order.order_id, "Order placed successfully");
                Ok(order)
            }
            Err(create_error) => {
                crate::error_with_trace!(
                    order_id = %order_id,
                    error = %create_error,
                    "Failed to store order, reversing debit"
                );

                if let Err(refund_error) = self
                    .wallet_service
                    .refund(student_id, request.total_amount, ORDER_REVERSAL_DESCRIPTION)
                    .await
                {
                    crate::error_with_trace!(
                        order_id = %order_id,
                        error = %refund_error,
                        "Failed to reverse debit for unstored order"
                    );
                }

                Err(create_error.into())
            }
        }
    }

    /// All orders for the student, newest first
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn order_history(&self, student_id: &str) -> ServiceResult<Vec<Order>> {
        validate_student_id(student_id)?;

        let orders = self.repository.find_orders_by_student(student_id).await?;

        crate::info_with_trace!("Found {} orders", orders.len());
        Ok(orders)
    }

    async fn verify_against_catalog(&self, request: &PlaceOrderRequest) -> ServiceResult<()> {
        let catalog = self.catalog_service.snapshot().await?;

        for item in &request.items {
            match catalog.price_of(item.meal_type, &item.item_name) {
                Some(price) if price == item.price => {}
                Some(price) => {
                    return Err(ServiceError::ValidationError {
                        message: format!(
                            "Price for {} ({}) is {}, not {}",
                            item.item_name, item.meal_type, price, item.price
                        ),
                    });
                }
                None => {
                    return Err(ServiceError::ValidationError {
                        message: format!(
                            "{} ({}) is not available",
                            item.item_name, item.meal_type
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}
