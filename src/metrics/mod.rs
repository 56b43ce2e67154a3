//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Intent submission and settlement outcomes
//! - Settlement latency
//! - Tracking retry pressure

use crate::error::{EngineError, EngineResult};

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Submission metrics
    pub static ref INTENTS_SUBMITTED: CounterVec = register_counter_vec!(
        "intent_engine_intents_submitted_total",
        "Total intents accepted by the execution network",
        &["source_chain", "target_chain"]
    ).unwrap();

    pub static ref SUBMISSIONS_REJECTED: CounterVec = register_counter_vec!(
        "intent_engine_submissions_rejected_total",
        "Total intents synchronously refused by the execution network",
        &[]
    ).unwrap();

    // Settlement metrics
    pub static ref SETTLEMENTS: CounterVec = register_counter_vec!(
        "intent_engine_settlements_total",
        "Terminal settlement outcomes by status",
        &["status"]
    ).unwrap();

    pub static ref SETTLEMENT_LATENCY: HistogramVec = register_histogram_vec!(
        "intent_engine_settlement_latency_seconds",
        "Time from submission to terminal status",
        &["status"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Tracking metrics
    pub static ref TRACKING_RETRIES: CounterVec = register_counter_vec!(
        "intent_engine_tracking_retries_total",
        "Transient settlement-query faults that were retried",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> EngineResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| EngineError::Internal(format!("metrics bind failed: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| EngineError::Internal(format!("metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_intent_submitted(source_chain: u64, target_chain: u64) {
    INTENTS_SUBMITTED
        .with_label_values(&[&source_chain.to_string(), &target_chain.to_string()])
        .inc();
}

pub fn record_submission_rejected() {
    SUBMISSIONS_REJECTED.with_label_values(&[]).inc();
}

pub fn record_settlement(status: &str, latency_secs: f64) {
    SETTLEMENTS.with_label_values(&[status]).inc();
    SETTLEMENT_LATENCY
        .with_label_values(&[status])
        .observe(latency_secs);
}

pub fn record_tracking_retry() {
    TRACKING_RETRIES.with_label_values(&[]).inc();
}
