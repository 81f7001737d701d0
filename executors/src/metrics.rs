use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
};
use spotter_core::error::RejectionKind;
use std::sync::{Arc, RwLock};

/// Instruments for the transaction lifecycle of a worker
pub struct ExecutorMetrics {
    pub transactions_broadcast: IntCounterVec,
    pub transactions_rejected: IntCounterVec,
    pub confirmation_duration: HistogramVec,
    pub gas_cache_lookups: IntCounterVec,
}

impl ExecutorMetrics {
    /// Create new executor metrics with the provided registry
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let transactions_broadcast = register_int_counter_vec_with_registry!(
            Opts::new(
                "spotter_executor_transactions_broadcast_total",
                "Raw transactions accepted by the write endpoint"
            ),
            &["flow"],
            registry
        )?;

        let transactions_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "spotter_executor_transactions_rejected_total",
                "Raw transactions refused by the write endpoint, by rejection kind"
            ),
            &["flow", "rejection"],
            registry
        )?;

        let confirmation_duration = register_histogram_vec_with_registry!(
            HistogramOpts::new(
                "spotter_executor_confirmation_duration_seconds",
                "Time from broadcast until the receipt was found or the wait gave up"
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 60.0, 90.0, 120.0, 180.0]),
            &["outcome"],
            registry
        )?;

        let gas_cache_lookups = register_int_counter_vec_with_registry!(
            Opts::new(
                "spotter_executor_gas_cache_lookups_total",
                "Gas estimation cache lookups"
            ),
            &["result"],
            registry
        )?;

        Ok(ExecutorMetrics {
            transactions_broadcast,
            transactions_rejected,
            confirmation_duration,
            gas_cache_lookups,
        })
    }
}

lazy_static! {
    /// Registry used when the binary does not install its own
    static ref DEFAULT_EXECUTOR_METRICS_REGISTRY: Registry = Registry::new();

    static ref DEFAULT_EXECUTOR_METRICS: Option<Arc<ExecutorMetrics>> =
        ExecutorMetrics::new(&DEFAULT_EXECUTOR_METRICS_REGISTRY)
            .map(Arc::new)
            .map_err(|e| tracing::error!(error = %e, "Failed to register default executor metrics"))
            .ok();

    /// Set by the binary crate, otherwise the default instance is used
    static ref EXECUTOR_METRICS_INSTANCE: RwLock<Option<Arc<ExecutorMetrics>>> =
        RwLock::new(None);
}

/// Install executor metrics registered on a custom registry.
/// Called once at startup by the binary crate.
pub fn initialize_metrics(metrics: ExecutorMetrics) {
    if let Ok(mut instance) = EXECUTOR_METRICS_INSTANCE.write() {
        *instance = Some(Arc::new(metrics));
    }
}

fn get_metrics() -> Option<Arc<ExecutorMetrics>> {
    EXECUTOR_METRICS_INSTANCE
        .read()
        .ok()
        .and_then(|instance| instance.clone())
        .or_else(|| DEFAULT_EXECUTOR_METRICS.clone())
}

/// Export metrics in Prometheus format from the default registry
pub fn export_default_metrics() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let encoder = TextEncoder::new();
    let metric_families = DEFAULT_EXECUTOR_METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn record_broadcast(flow: &str) {
    if let Some(metrics) = get_metrics() {
        metrics.transactions_broadcast.with_label_values(&[flow]).inc();
    }
}

pub fn record_rejection(flow: &str, rejection: RejectionKind) {
    if let Some(metrics) = get_metrics() {
        let rejection = format!("{rejection:?}");
        metrics
            .transactions_rejected
            .with_label_values(&[flow, rejection.as_str()])
            .inc();
    }
}

pub fn record_confirmation(outcome: &str, duration_seconds: f64) {
    if let Some(metrics) = get_metrics() {
        metrics
            .confirmation_duration
            .with_label_values(&[outcome])
            .observe(duration_seconds);
    }
}

pub fn record_gas_cache_lookup(hit: bool) {
    if let Some(metrics) = get_metrics() {
        let result = if hit { "hit" } else { "miss" };
        metrics.gas_cache_lookups.with_label_values(&[result]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_on_custom_registry() {
        let registry = Registry::new();
        let metrics = ExecutorMetrics::new(&registry).unwrap();

        metrics.transactions_broadcast.with_label_values(&["work"]).inc();
        metrics
            .transactions_rejected
            .with_label_values(&["faucet", "NonceTooLow"])
            .inc();
        metrics
            .confirmation_duration
            .with_label_values(&["confirmed"])
            .observe(12.0);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let output = String::from_utf8(buffer).unwrap();

        assert!(output.contains("spotter_executor_transactions_broadcast_total"));
        assert!(output.contains("spotter_executor_transactions_rejected_total"));
        assert!(output.contains("spotter_executor_confirmation_duration_seconds"));
    }

    #[test]
    fn test_default_registry_export() {
        record_gas_cache_lookup(false);
        record_gas_cache_lookup(true);

        let output = export_default_metrics().unwrap();
        assert!(output.contains("spotter_executor_gas_cache_lookups_total"));
    }
}
