//! Error types shared across the training and inference paths

use crate::models::UsageLabel;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems in a training run. Any of these aborts the run before
/// the artifact on disk is touched.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no stations found; check the station and session tables")]
    NoStations,

    #[error(
        "only one usage label ({0}) occurs across all stations; \
         a classifier needs at least two (too few sessions or miscalibrated thresholds)"
    )]
    SingleClass(UsageLabel),

    #[error("label '{label}' has only {count} station(s); at least 2 are needed for a stratified split")]
    ClassTooSmall { label: UsageLabel, count: usize },

    #[error("model fitting failed: {0}")]
    Model(#[from] smartcore::error::Failed),

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Invalid threshold policy
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("threshold bound {0} is not finite")]
    NotFinite(f64),

    #[error("threshold bounds must be non-decreasing ({previous} then {next})")]
    Unordered { previous: f64, next: f64 },
}

/// Failures reading or writing the pipeline artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("i/o error on artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact was trained on features {found:?}, expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Client-side problems with a prediction request
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Server-side problems while predicting
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("Model not loaded: {0}")]
    NotReady(String),

    #[error("prediction failed: {0}")]
    Internal(String),
}
