//! Prometheus metrics for the transfer workflow.
//!
//! Counters are registered in a crate-local [`REGISTRY`] and rendered in the
//! Prometheus text format by [`gather`], which backs `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

fn register<C>(collector: C) -> C
where
    C: prometheus::core::Collector + Clone + 'static,
{
    REGISTRY
        .register(Box::new(collector.clone()))
        .expect("metric can be registered");
    collector
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref TRANSFER_REQUESTS_CREATED: IntCounter = register(
        IntCounter::new(
            "transfer_requests_created_total",
            "Total number of transfer requests created"
        )
        .expect("metric can be created")
    );
    pub static ref TRANSFER_TRANSITIONS: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "transfer_transitions_total",
                "Total number of transfer status transitions by target status"
            ),
            &["status"]
        )
        .expect("metric can be created")
    );
    pub static ref TRANSFER_FAILURES: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "transfer_workflow_failures_total",
                "Total number of failed transfer workflow operations by error code"
            ),
            &["operation", "code"]
        )
        .expect("metric can be created")
    );
    pub static ref UNITS_SAVED: IntCounter = register(
        IntCounter::new(
            "waste_prevention_units_saved_total",
            "Total number of units delivered through completed transfers"
        )
        .expect("metric can be created")
    );
    pub static ref RESERVATION_CONFLICTS: IntCounter = register(
        IntCounter::new(
            "inventory_reservation_conflicts_total",
            "Conditional reservation updates that matched no row"
        )
        .expect("metric can be created")
    );
    pub static ref TRANSITION_RETRIES: IntCounter = register(
        IntCounter::new(
            "transfer_transition_retries_total",
            "Optimistic-lock retries while transitioning transfer requests"
        )
        .expect("metric can be created")
    );
    pub static ref WRITE_RETRIES: IntCounter = register(
        IntCounter::new(
            "database_write_retries_total",
            "Write transactions retried after the database reported lock contention"
        )
        .expect("metric can be created")
    );
}

/// Forces registration so every series appears in the first scrape.
pub fn init() {
    lazy_static::initialize(&TRANSFER_REQUESTS_CREATED);
    lazy_static::initialize(&TRANSFER_TRANSITIONS);
    lazy_static::initialize(&TRANSFER_FAILURES);
    lazy_static::initialize(&UNITS_SAVED);
    lazy_static::initialize(&RESERVATION_CONFLICTS);
    lazy_static::initialize(&TRANSITION_RETRIES);
    lazy_static::initialize(&WRITE_RETRIES);
}

pub fn record_failure(operation: &str, error: &crate::errors::ServiceError) {
    TRANSFER_FAILURES
        .with_label_values(&[operation, error.code()])
        .inc();
}

/// Renders the registry in the Prometheus text exposition format.
pub fn gather() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_includes_registered_counters() {
        init();
        TRANSFER_TRANSITIONS.with_label_values(&["approved"]).inc();

        let text = gather().unwrap();
        assert!(text.contains("transfer_requests_created_total"));
        assert!(text.contains("transfer_transitions_total{status=\"approved\"}"));
    }
}
