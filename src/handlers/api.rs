use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::models::{
    AddMoneyRequest, ApiResponse, MenuItem, Order, PlaceOrderRequest, ServiceError, Special,
    Wallet, WalletTransaction,
};
use crate::observability::BusinessTracingMiddleware;
use crate::services::{CatalogService, OrderService, WalletService};

/// Header carrying the authenticated student, set by the upstream auth layer
pub const STUDENT_ID_HEADER: &str = "x-student-id";

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Shared application state containing all services
#[derive(Clone)]
pub struct ApiState {
    pub wallet_service: Arc<WalletService>,
    pub order_service: Arc<OrderService>,
    pub catalog_service: Arc<CatalogService>,
    pub tracing: Arc<BusinessTracingMiddleware>,
}

/// Authenticated student making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for StudentId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let student_id = parts
            .headers
            .get(STUDENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match student_id {
            Some(student_id) => Ok(StudentId(student_id.to_string())),
            None => {
                warn!("Request without student identity");
                Err(error_response(StatusCode::UNAUTHORIZED, "Not authorized"))
            }
        }
    }
}

// =============================================================================
// CATALOG ENDPOINTS
// =============================================================================

/// List the available menu items
#[instrument(name = "list_menu", skip(state, student_id), fields(student_id = %student_id.0))]
pub async fn list_menu(
    State(state): State<ApiState>,
    student_id: StudentId,
) -> ApiResult<Vec<MenuItem>> {
    info!("Listing menu");

    match state
        .tracing
        .trace_catalog_request("menu", state.catalog_service.list_available_menu_items())
        .await
    {
        Ok(menu) => Ok(Json(ApiResponse::ok(menu))),
        Err(err) => {
            error!("Failed to list menu: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// List today's available specials
#[instrument(name = "list_specials", skip(state, student_id), fields(student_id = %student_id.0))]
pub async fn list_specials(
    State(state): State<ApiState>,
    student_id: StudentId,
) -> ApiResult<Vec<Special>> {
    info!("Listing specials");

    match state
        .tracing
        .trace_catalog_request("specials", state.catalog_service.list_today_specials())
        .await
    {
        Ok(specials) => Ok(Json(ApiResponse::ok(specials))),
        Err(err) => {
            error!("Failed to list specials: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// WALLET ENDPOINTS
// =============================================================================

/// Get the caller's wallet, creating it on first access
#[instrument(name = "get_wallet", skip(state, student_id), fields(student_id = %student_id.0))]
pub async fn get_wallet(
    State(state): State<ApiState>,
    student_id: StudentId,
) -> ApiResult<Wallet> {
    info!("Getting wallet");

    match state
        .tracing
        .trace_wallet_operation(
            "get_wallet",
            &student_id.0,
            state.wallet_service.get_or_create_wallet(&student_id.0),
        )
        .await
    {
        Ok(wallet) => Ok(Json(ApiResponse::ok(wallet))),
        Err(err) => {
            error!("Failed to get wallet: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Top up the caller's wallet
#[instrument(name = "add_money", skip(state, student_id, payload), fields(student_id = %student_id.0))]
pub async fn add_money(
    State(state): State<ApiState>,
    student_id: StudentId,
    payload: Result<Json<AddMoneyRequest>, JsonRejection>,
) -> ApiResult<Wallet> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;

    crate::info_with_trace!("Adding {} to wallet", request.amount);

    match state
        .tracing
        .trace_wallet_operation(
            "add_money",
            &student_id.0,
            state.wallet_service.add_money(&student_id.0, request),
        )
        .await
    {
        Ok(wallet) => {
            info!("Wallet balance is now {}", wallet.balance);
            Ok(Json(ApiResponse::ok(wallet)))
        }
        Err(err) => {
            error!("Failed to add money: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// The caller's ledger, oldest first
#[instrument(name = "wallet_history", skip(state, student_id), fields(student_id = %student_id.0))]
pub async fn wallet_history(
    State(state): State<ApiState>,
    student_id: StudentId,
) -> ApiResult<Vec<WalletTransaction>> {
    info!("Getting wallet history");

    match state
        .tracing
        .trace_wallet_operation(
            "transaction_history",
            &student_id.0,
            state.wallet_service.transaction_history(&student_id.0),
        )
        .await
    {
        Ok(history) => Ok(Json(ApiResponse::ok(history))),
        Err(err) => {
            error!("Failed to get wallet history: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// ORDER ENDPOINTS
// =============================================================================

/// Place an order paid from the caller's wallet
#[instrument(name = "place_order", skip(state, student_id, payload), fields(student_id = %student_id.0))]
pub async fn place_order(
    State(state): State<ApiState>,
    student_id: StudentId,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ApiError> {
    let Json(request) = payload.map_err(json_rejection_to_response)?;

    crate::info_with_trace!(
        "Placing order with {} items totalling {}",
        request.items.len(),
        request.total_amount
    );

    match state
        .tracing
        .trace_order_operation(
            "place_order",
            &student_id.0,
            state.order_service.place_order(&student_id.0, request),
        )
        .await
    {
        Ok(order) => {
            if let Ok(amount) = f64::try_from(order.total_amount) {
                state.tracing.record_order_amount(amount);
            }
            info!(order_id = %order.order_id, "Order placed");
            Ok((StatusCode::CREATED, Json(ApiResponse::ok(order))))
        }
        Err(err) => {
            warn!("Order not placed: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// The caller's orders, newest first
#[instrument(name = "list_orders", skip(state, student_id), fields(student_id = %student_id.0))]
pub async fn list_orders(
    State(state): State<ApiState>,
    student_id: StudentId,
) -> ApiResult<Vec<Order>> {
    info!("Listing orders");

    match state
        .tracing
        .trace_order_operation(
            "order_history",
            &student_id.0,
            state.order_service.order_history(&student_id.0),
        )
        .await
    {
        Ok(orders) => Ok(Json(ApiResponse::ok(orders))),
        Err(err) => {
            error!("Failed to list orders: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

/// Convert service errors to HTTP responses. Store failures are reported
/// generically; their details only go to the logs.
pub(crate) fn service_error_to_response(err: ServiceError) -> ApiError {
    match err {
        ServiceError::InsufficientBalance => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        ServiceError::ValidationError { message } => {
            error_response(StatusCode::BAD_REQUEST, message)
        }
        ServiceError::Repository { .. } | ServiceError::Configuration { .. } => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn json_rejection_to_response(rejection: JsonRejection) -> ApiError {
    warn!("Rejected request body: {}", rejection.body_text());
    error_response(rejection.status(), rejection.body_text())
}
