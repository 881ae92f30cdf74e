//! Usage-tier classifier for EV charging stations
//!
//! This crate provides the core functionality for:
//! - Aggregating charging history into per-station features
//! - Labeling stations into usage tiers
//! - Training and selecting a classification pipeline
//! - Persisting and serving the selected pipeline
//! - Health checks and observability

pub mod artifact;
pub mod error;
pub mod features;
pub mod health;
pub mod inference;
pub mod labels;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod selection;
pub mod source;
pub mod trainer;

pub use error::{ArtifactError, PredictError, RequestError, ThresholdError, TrainingError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{parse_request, InferenceService, ModelState};
pub use models::*;
pub use observability::{StructuredLogger, UsageMetrics};
pub use trainer::{TrainingConfig, TrainingJob, TrainingReport};
