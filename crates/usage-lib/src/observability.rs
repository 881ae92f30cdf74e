//! Observability for training and inference
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, loaded model info)
//! - Named structured events on top of `tracing`

use crate::models::UsageLabel;
use crate::pipeline::ModelFamily;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge, Gauge, GaugeVec, Histogram, IntCounter,
    IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Latency buckets in seconds. Inference is a few microseconds to milliseconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

/// Collectors are registered once per process
static GLOBAL_METRICS: OnceLock<UsageMetricsInner> = OnceLock::new();

struct UsageMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    rejected_requests_total: IntCounter,
    prediction_errors_total: IntCounter,
    model_info: GaugeVec,
    model_accuracy: Gauge,
    model_ready: IntGauge,
}

impl UsageMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "usage_prediction_latency_seconds",
                "Time spent classifying one station",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register usage_prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "usage_predictions_total",
                "Predictions served, by predicted usage level",
                &["label"]
            )
            .expect("Failed to register usage_predictions_total"),

            rejected_requests_total: register_int_counter!(
                "usage_rejected_requests_total",
                "Prediction requests rejected as invalid"
            )
            .expect("Failed to register usage_rejected_requests_total"),

            prediction_errors_total: register_int_counter!(
                "usage_prediction_errors_total",
                "Prediction requests that failed on the server side"
            )
            .expect("Failed to register usage_prediction_errors_total"),

            model_info: register_gauge_vec!(
                "usage_model_info",
                "Currently loaded pipeline",
                &["family", "checksum"]
            )
            .expect("Failed to register usage_model_info"),

            model_accuracy: register_gauge!(
                "usage_model_accuracy",
                "Held-out accuracy recorded when the loaded pipeline was trained"
            )
            .expect("Failed to register usage_model_accuracy"),

            model_ready: register_int_gauge!(
                "usage_model_ready",
                "1 when a pipeline is loaded and serving"
            )
            .expect("Failed to register usage_model_ready"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same collectors.
#[derive(Clone)]
pub struct UsageMetrics {
    _private: (),
}

impl Default for UsageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageMetrics {
    /// Register the collectors on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(UsageMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &UsageMetricsInner {
        GLOBAL_METRICS.get_or_init(UsageMetricsInner::new)
    }

    /// Record the time spent on one prediction
    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    /// Count a served prediction under its label
    pub fn inc_predictions(&self, label: UsageLabel) {
        self.inner()
            .predictions_total
            .with_label_values(&[label.as_str()])
            .inc();
    }

    /// Count a request rejected with 400
    pub fn inc_rejected(&self) {
        self.inner().rejected_requests_total.inc();
    }

    /// Count a request that failed with 500
    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors_total.inc();
    }

    /// Publish the loaded pipeline; replaces any previous info series
    pub fn set_model(&self, family: ModelFamily, checksum: &str, accuracy: f64) {
        let inner = self.inner();
        inner.model_info.reset();
        inner
            .model_info
            .with_label_values(&[&family.to_string(), checksum])
            .set(1.0);
        inner.model_accuracy.set(accuracy);
    }

    /// 1 while a pipeline is serving
    pub fn set_ready(&self, ready: bool) {
        self.inner().model_ready.set(i64::from(ready));
    }
}

/// Named structured events shared by the server and the training job
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    /// Logger tagging every event with `service`
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Pipeline artifact loaded at startup
    pub fn log_model_loaded(&self, path: &Path, family: ModelFamily, checksum: &str, accuracy: f64) {
        info!(
            event = "model_loaded",
            service = %self.service,
            path = %path.display(),
            family = %family,
            checksum = %checksum,
            accuracy = accuracy,
            "Pipeline loaded"
        );
    }

    /// Artifact missing or unreadable
    pub fn log_model_load_failed(&self, path: &Path, reason: &str) {
        error!(
            event = "model_load_failed",
            service = %self.service,
            path = %path.display(),
            reason = %reason,
            "Pipeline could not be loaded; predictions will fail until restart"
        );
    }

    /// One prediction served
    pub fn log_prediction(&self, label: UsageLabel, neighborhood: &str, latency_us: u128) {
        info!(
            event = "prediction_served",
            service = %self.service,
            predicted_usage_level = %label,
            nil = %neighborhood,
            latency_us = latency_us as u64,
            "Prediction served"
        );
    }

    /// Request rejected before reaching the model
    pub fn log_rejected(&self, reason: &str) {
        warn!(
            event = "prediction_rejected",
            service = %self.service,
            reason = %reason,
            "Rejected prediction request"
        );
    }

    /// Training run began with these settings
    pub fn log_training_started(&self, window_days: u32, test_fraction: f64, seed: u64) {
        info!(
            event = "training_started",
            service = %self.service,
            window_days = window_days,
            test_fraction = test_fraction,
            seed = seed,
            "Training run started"
        );
    }

    /// Training run finished; `artifact` is `None` on a dry run
    pub fn log_training_completed(
        &self,
        family: ModelFamily,
        accuracy: f64,
        stations: usize,
        artifact: Option<&Path>,
    ) {
        info!(
            event = "training_completed",
            service = %self.service,
            family = %family,
            accuracy = accuracy,
            stations = stations,
            artifact = ?artifact.map(|p| p.display().to_string()),
            "Training run completed"
        );
    }

    /// Training run failed before writing anything
    pub fn log_training_aborted(&self, reason: &str) {
        error!(
            event = "training_aborted",
            service = %self.service,
            reason = %reason,
            "Training run aborted; previous artifact left in place"
        );
    }

    /// Server bound and accepting requests
    pub fn log_startup(&self, version: &str, bind: &str) {
        info!(
            event = "server_started",
            service = %self.service,
            version = %version,
            bind = %bind,
            "Usage classifier server started"
        );
    }

    /// Server stopping
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            service = %self.service,
            reason = %reason,
            "Usage classifier server shutting down"
        );
    }
}
