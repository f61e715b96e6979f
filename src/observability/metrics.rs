use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, Opts,
    Registry, TextEncoder,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to register metric: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

/// Prometheus metrics for the cafeteria service
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // HTTP metrics
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_in_flight: GaugeVec,

    // Business logic metrics
    pub wallet_operations_total: CounterVec,
    pub order_operations_total: CounterVec,
    pub order_amount: Histogram,
    pub insufficient_balance_rejections_total: Counter,
    pub catalog_requests_total: CounterVec,
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

impl Metrics {
    /// Create a new metrics instance with all required metrics registered
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        info!("Initializing Prometheus metrics");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "http_requests_total",
                "Total number of HTTP requests processed",
            ),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let http_requests_in_flight = GaugeVec::new(
            Opts::new(
                "http_requests_in_flight",
                "Number of HTTP requests currently being processed",
            ),
            &["method", "endpoint"],
        )?;

        let wallet_operations_total = CounterVec::new(
            Opts::new(
                "wallet_operations_total",
                "Total number of wallet operations",
            ),
            &["operation", "status"],
        )?;

        let order_operations_total = CounterVec::new(
            Opts::new("order_operations_total", "Total number of order operations"),
            &["operation", "status"],
        )?;

        let order_amount = Histogram::with_opts(
            HistogramOpts::new("order_amount", "Total amount of placed orders")
                .buckets(vec![10.0, 25.0, 50.0, 100.0, 150.0, 250.0, 500.0, 1000.0]),
        )?;

        let insufficient_balance_rejections_total = Counter::new(
            "insufficient_balance_rejections_total",
            "Orders rejected because the wallet could not cover them",
        )?;

        let catalog_requests_total = CounterVec::new(
            Opts::new(
                "catalog_requests_total",
                "Total number of menu and specials requests",
            ),
            &["catalog", "status"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(wallet_operations_total.clone()))?;
        registry.register(Box::new(order_operations_total.clone()))?;
        registry.register(Box::new(order_amount.clone()))?;
        registry.register(Box::new(insufficient_balance_rejections_total.clone()))?;
        registry.register(Box::new(catalog_requests_total.clone()))?;

        info!("Prometheus metrics initialized successfully");

        Ok(Metrics {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            wallet_operations_total,
            order_operations_total,
            order_amount,
            insufficient_balance_rejections_total,
            catalog_requests_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    /// Record HTTP request metrics
    pub fn record_http_request(
        &self,
        method: &str,
        endpoint: &str,
        status_code: u16,
        duration_seconds: f64,
    ) {
        let status_str = status_code.to_string();

        self.http_requests_total
            .with_label_values(&[method, endpoint, &status_str])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration_seconds);
    }

    pub fn record_wallet_operation(&self, operation: &str, success: bool) {
        self.wallet_operations_total
            .with_label_values(&[operation, status_label(success)])
            .inc();
    }

    pub fn record_order_operation(&self, operation: &str, success: bool) {
        self.order_operations_total
            .with_label_values(&[operation, status_label(success)])
            .inc();
    }

    pub fn record_order_amount(&self, amount: f64) {
        self.order_amount.observe(amount);
    }

    pub fn record_insufficient_balance(&self) {
        self.insufficient_balance_rejections_total.inc();
    }

    pub fn record_catalog_request(&self, catalog: &str, success: bool) {
        self.catalog_requests_total
            .with_label_values(&[catalog, status_label(success)])
            .inc();
    }

    pub fn increment_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .inc();
    }

    pub fn decrement_in_flight(&self, method: &str, endpoint: &str) {
        self.http_requests_in_flight
            .with_label_values(&[method, endpoint])
            .dec();
    }
}
