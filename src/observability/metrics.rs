use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::AppError;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// How a transfer attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Committed,
    Rejected,
    NotFound,
    Conflict,
    Cancelled,
    Failed,
}

impl TransferOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::Committed => "committed",
            TransferOutcome::Rejected => "rejected",
            TransferOutcome::NotFound => "not_found",
            TransferOutcome::Conflict => "conflict",
            TransferOutcome::Cancelled => "cancelled",
            TransferOutcome::Failed => "failed",
        }
    }
}

impl From<&AppError> for TransferOutcome {
    fn from(err: &AppError) -> Self {
        match err.root() {
            AppError::Validation(_) | AppError::InsufficientFunds { .. } => TransferOutcome::Rejected,
            AppError::NotFound(_) => TransferOutcome::NotFound,
            AppError::TransientStore(_) => TransferOutcome::Conflict,
            AppError::Cancelled(_) => TransferOutcome::Cancelled,
            _ => TransferOutcome::Failed,
        }
    }
}

/// Metrics collector for the ledger.
#[derive(Debug, Clone, Default)]
pub struct Metrics;

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_transfer(&self, outcome: TransferOutcome, duration_ms: f64) {
        counter!("bank_transfers_total", "outcome" => outcome.as_str()).increment(1);
        histogram!("bank_transfer_duration_ms", "outcome" => outcome.as_str()).record(duration_ms);
    }

    pub fn record_rollback(&self, succeeded: bool) {
        counter!("bank_transfer_rollbacks_total", "success" => succeeded.to_string()).increment(1);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, AppError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e)))?;
    describe_metrics();

    METRICS.get_or_init(Metrics::new);
    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("bank_transfers_total", Unit::Count, "Transfer attempts by outcome");
    describe_histogram!("bank_transfer_duration_ms", Unit::Milliseconds, "Transfer latency in milliseconds");
    describe_counter!("bank_transfer_rollbacks_total", Unit::Count, "Transfer transactions rolled back");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
