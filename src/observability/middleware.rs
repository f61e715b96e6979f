use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;
use crate::models::{ServiceError, ServiceResult};

/// Middleware for automatic request tracing and metrics collection
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();

    // Extract User-Agent header
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    // Extract client IP from various headers (X-Forwarded-For, X-Real-IP, or connection info)
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next()) // Take first IP if multiple
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("unknown")
        .trim()
        .to_string();

    // Try to get the matched path for better endpoint grouping
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    // Create a span with the actual endpoint name instead of generic middleware name
    let span_name = format!("{} {}", method, endpoint);

    // Create a span with the endpoint-specific name
    let span = tracing::info_span!(
        target: "cafeteria_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        http.client_ip = %client_ip,
        client.address = %client_ip,
        http.status_code = tracing::field::Empty,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
        response.status = tracing::field::Empty,
    );

    // Execute the rest of the middleware within this span
    async {
        // Increment in-flight requests
        metrics.increment_in_flight(&method, &endpoint);

        // Get trace ID from current span context (after entering the span)
        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %method, path = %endpoint, user_agent = %user_agent, client_ip = %client_ip, "Processing request");

        // Process the request
        let response = next.run(request).await;

        // Calculate duration
        let duration = start_time.elapsed();
        let duration_seconds = duration.as_secs_f64();
        let duration_ms = duration.as_millis();

        // Get status code
        let status_code = response.status().as_u16();

        // Record additional span attributes with proper X-Ray format
        tracing::Span::current().record("http.status_code", status_code);
        tracing::Span::current().record("http.response.status_code", status_code);
        tracing::Span::current().record("http.response_time_ms", duration_ms);
        tracing::Span::current().record("response.status", status_code);

        // Set span status based on HTTP status code for X-Ray
        let current_span = tracing::Span::current();
        let span_context = current_span.context();
        let otel_span = span_context.span();
        if status_code >= 400 {
            otel_span.set_status(opentelemetry::trace::Status::error("HTTP error"));
        } else {
            otel_span.set_status(opentelemetry::trace::Status::Ok);
        }

        // Record metrics
        metrics.record_http_request(&method, &endpoint, status_code, duration_seconds);

        // Decrement in-flight requests
        metrics.decrement_in_flight(&method, &endpoint);

        // Log request completion with trace ID
        if status_code >= 400 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                user_agent = %user_agent,
                client_ip = %client_ip,
                "Request completed with error"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                user_agent = %user_agent,
                client_ip = %client_ip,
                "Request completed successfully"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Business operation tracing shared by the HTTP handlers
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a wallet operation
    #[instrument(skip_all, fields(
        operation = %operation,
        student_id = %student_id,
    ))]
    pub async fn trace_wallet_operation<F, T>(
        &self,
        operation: &str,
        student_id: &str,
        future: F,
    ) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        let start_time = Instant::now();

        info!("Starting wallet operation");

        let result = future.await;
        self.metrics
            .record_wallet_operation(operation, result.is_ok());
        log_outcome("Wallet operation", start_time, &result);
        result
    }

    /// Trace an order operation; insufficient-balance rejections are counted
    /// separately from other failures
    #[instrument(skip_all, fields(
        operation = %operation,
        student_id = %student_id,
    ))]
    pub async fn trace_order_operation<F, T>(
        &self,
        operation: &str,
        student_id: &str,
        future: F,
    ) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        let start_time = Instant::now();

        info!("Starting order operation");

        let result = future.await;
        self.metrics.record_order_operation(operation, result.is_ok());
        if let Err(ServiceError::InsufficientBalance) = &result {
            self.metrics.record_insufficient_balance();
        }
        log_outcome("Order operation", start_time, &result);
        result
    }

    /// Trace a menu or specials request
    #[instrument(skip_all, fields(catalog = %catalog))]
    pub async fn trace_catalog_request<F, T>(&self, catalog: &str, future: F) -> ServiceResult<T>
    where
        F: std::future::Future<Output = ServiceResult<T>>,
    {
        let start_time = Instant::now();

        let result = future.await;
        self.metrics.record_catalog_request(catalog, result.is_ok());
        log_outcome("Catalog request", start_time, &result);
        result
    }

    pub fn record_order_amount(&self, amount: f64) {
        self.metrics.record_order_amount(amount);
    }
}

fn log_outcome<T>(kind: &str, start_time: Instant, result: &ServiceResult<T>) {
    let duration_ms = start_time.elapsed().as_millis();
    match result {
        Ok(_) => info!(duration_ms = duration_ms, "{} completed successfully", kind),
        // expected business outcomes are not errors of the service
        Err(e @ (ServiceError::InsufficientBalance | ServiceError::ValidationError { .. })) => {
            warn!(error = %e, duration_ms = duration_ms, "{} rejected", kind)
        }
        Err(e) => error!(error = %e, duration_ms = duration_ms, "{} failed", kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "test response"
    }

    async fn error_handler() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    #[tokio::test]
    async fn test_observability_middleware_success() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let metrics_clone = metrics.clone();

        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics_clone.clone(), req, next)
            }));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/test")
            .header("user-agent", "test-client/1.0")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Verify metrics were recorded
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_observability_middleware_missing_user_agent() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let metrics_clone = metrics.clone();

        let app = Router::new()
            .route("/test", get(test_handler))
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics_clone.clone(), req, next)
            }));

        // Request without user-agent header
        let request = Request::builder()
            .method(Method::GET)
            .uri("/test")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Verify metrics were recorded
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_observability_middleware_error() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let metrics_clone = metrics.clone();

        let app = Router::new()
            .route("/error", get(error_handler))
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics_clone.clone(), req, next)
            }));

        let request = Request::builder()
            .method(Method::GET)
            .uri("/error")
            .header("user-agent", "error-test-client/1.0")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Verify error metrics were recorded
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_business_tracing_middleware() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let middleware = BusinessTracingMiddleware::new(metrics.clone());

        let result = middleware
            .trace_wallet_operation("add_money", "student-1", async { Ok(()) })
            .await;
        assert!(result.is_ok());

        let result: ServiceResult<()> = middleware
            .trace_order_operation("place_order", "student-1", async {
                Err(ServiceError::InsufficientBalance)
            })
            .await;
        assert!(matches!(result, Err(ServiceError::InsufficientBalance)));

        let result = middleware
            .trace_catalog_request("menu", async { Ok(vec![1, 2, 3]) })
            .await;
        assert_eq!(result.unwrap().len(), 3);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("wallet_operations_total"));
        assert!(encoded.contains("order_operations_total"));
        assert!(encoded.contains("insufficient_balance_rejections_total 1"));
        assert!(encoded.contains("catalog_requests_total"));
    }
}
