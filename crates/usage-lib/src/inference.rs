//! Inference service
//!
//! Owns the pipeline loaded at startup. The lifecycle is
//! `Uninitialized → Loading → Ready | LoadFailed`; a failed load stays
//! failed until the process restarts, and there is no hot reload. After
//! `load` the service is only read, so it can sit behind an `Arc` with no
//! locking on the request path.

use crate::artifact::{self, LoadedArtifact};
use crate::error::{ArtifactError, PredictError, RequestError};
use crate::models::{StationFeatures, UsageLabel, FEATURE_NAMES, UNKNOWN_NEIGHBORHOOD};
use crate::observability::{StructuredLogger, UsageMetrics};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of the served pipeline
#[derive(Debug, Clone)]
pub enum ModelState {
    Uninitialized,
    Loading,
    Ready(Arc<LoadedArtifact>),
    /// `missing` is set when no artifact exists yet (never trained)
    LoadFailed { reason: String, missing: bool },
}

impl ModelState {
    pub fn name(&self) -> &'static str {
        match self {
            ModelState::Uninitialized => "uninitialized",
            ModelState::Loading => "loading",
            ModelState::Ready(_) => "ready",
            ModelState::LoadFailed { .. } => "load_failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready(_))
    }
}

pub struct InferenceService {
    state: ModelState,
    metrics: UsageMetrics,
    logger: StructuredLogger,
}

impl Default for InferenceService {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceService {
    pub fn new() -> Self {
        Self {
            state: ModelState::Uninitialized,
            metrics: UsageMetrics::new(),
            logger: StructuredLogger::new("usage-server"),
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Load the artifact at `path`. Only the first call has an effect.
    pub fn load(&mut self, path: &Path) -> &ModelState {
        if !matches!(self.state, ModelState::Uninitialized) {
            return &self.state;
        }
        self.state = ModelState::Loading;

        self.state = match artifact::load(path) {
            Ok(loaded) => {
                let meta = &loaded.artifact.metadata;
                self.logger
                    .log_model_loaded(path, meta.family, &loaded.checksum, meta.accuracy);
                self.metrics
                    .set_model(meta.family, &loaded.checksum, meta.accuracy);
                self.metrics.set_ready(true);
                ModelState::Ready(Arc::new(loaded))
            }
            Err(e) => {
                let reason = e.to_string();
                self.logger.log_model_load_failed(path, &reason);
                self.metrics.set_ready(false);
                ModelState::LoadFailed {
                    reason,
                    missing: matches!(e, ArtifactError::NotFound(_)),
                }
            }
        };
        &self.state
    }

    /// Classify one station
    pub fn predict(&self, features: &StationFeatures) -> Result<UsageLabel, PredictError> {
        let loaded = match &self.state {
            ModelState::Ready(loaded) => loaded,
            ModelState::Uninitialized => {
                return Err(PredictError::NotReady("no pipeline has been loaded".to_string()))
            }
            ModelState::Loading => {
                return Err(PredictError::NotReady("pipeline is still loading".to_string()))
            }
            ModelState::LoadFailed { reason, .. } => {
                return Err(PredictError::NotReady(reason.clone()))
            }
        };

        let start = Instant::now();
        let label = loaded
            .artifact
            .pipeline
            .predict_one(features)
            .map_err(|e| {
                self.metrics.inc_prediction_errors();
                PredictError::Internal(e.to_string())
            })?;

        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics.inc_predictions(label);
        self.logger
            .log_prediction(label, &features.neighborhood, elapsed.as_micros());

        Ok(label)
    }
}

/// Validate a JSON request body into a feature row.
///
/// Missing keys are reported together, in model column order. Numbers may
/// also arrive as numeric strings. `NIL` may be a string, number or
/// boolean; `null` means "unknown neighborhood". Extra keys are ignored.
pub fn parse_request(body: &Value) -> Result<StationFeatures, RequestError> {
    let object = body.as_object().ok_or(RequestError::NotAnObject)?;

    let missing: Vec<String> = FEATURE_NAMES
        .iter()
        .filter(|name| !object.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RequestError::MissingFields(missing));
    }

    let number = |name: &str| parse_number(name, &object[name]);

    Ok(StationFeatures {
        power_kw: number("Potenza_kW")?,
        neighborhood: parse_neighborhood(&object["NIL"])?,
        avg_daily_sessions: number("RicaricheMedieGiornaliere")?,
        avg_duration_min: number("DurataMediaMinuti")?,
        avg_energy_kwh: number("EnergiaMediaKWh")?,
    })
}

fn invalid(field: &str, reason: impl Into<String>) -> RequestError {
    RequestError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn parse_number(field: &str, value: &Value) -> Result<f64, RequestError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(invalid(field, "must be a finite number")),
        None => Err(invalid(field, format!("expected a number, got {}", value))),
    }
}

fn parse_neighborhood(value: &Value) -> Result<String, RequestError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(UNKNOWN_NEIGHBORHOOD.to_string()),
        _ => Err(invalid("NIL", "expected a neighborhood code")),
    }
}
