//! Pipeline artifact persistence
//!
//! The artifact is one JSON document holding the feature schema, the fitted
//! pipeline and training metadata. Writes go to a temp file that is synced
//! and renamed over the target, so readers never observe a partial file.

use crate::error::ArtifactError;
use crate::labels::UsageThresholds;
use crate::models::{UsageLabel, FEATURE_NAMES};
use crate::pipeline::{ModelFamily, Pipeline};
use crate::selection::CandidateResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default artifact location, relative to the working directory
pub const DEFAULT_ARTIFACT_PATH: &str = "model.json";

/// Training facts stored next to the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub family: ModelFamily,
    pub accuracy: f64,
    pub train_size: usize,
    pub test_size: usize,
    pub station_count: usize,
    pub label_counts: BTreeMap<UsageLabel, usize>,
    pub candidates: Vec<CandidateResult>,
    pub thresholds: UsageThresholds,
    pub window_days: u32,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
}

/// Everything inference needs to reproduce the training-time transform
#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub feature_names: Vec<String>,
    pub pipeline: Pipeline,
    pub metadata: ArtifactMetadata,
}

impl PipelineArtifact {
    pub fn new(pipeline: Pipeline, metadata: ArtifactMetadata) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            pipeline,
            metadata,
        }
    }

    fn check_schema(&self) -> Result<(), ArtifactError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(ArtifactError::SchemaMismatch {
                expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }
        Ok(())
    }
}

/// An artifact together with the checksum of its bytes on disk
#[derive(Debug)]
pub struct LoadedArtifact {
    pub artifact: PipelineArtifact,
    pub checksum: String,
    pub path: PathBuf,
}

/// SHA-256 hex digest
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let mut file = File::create(path).map_err(|e| io_error(path, e))?;
    file.write_all(bytes).map_err(|e| io_error(path, e))?;
    file.sync_all().map_err(|e| io_error(path, e))
}

/// Atomically replace the artifact at `path`; returns the checksum written
pub fn save(path: &Path, artifact: &PipelineArtifact) -> Result<String, ArtifactError> {
    let bytes = serde_json::to_vec_pretty(artifact).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let written = write_synced(&temp_path, &bytes)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| io_error(path, e)));
    if let Err(e) = written {
        // Never leave a half-written temp file next to the artifact
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %temp_path.display(), error = %cleanup, "Failed to remove temp artifact");
            }
        }
        return Err(e);
    }

    let checksum = compute_checksum(&bytes);
    info!(
        path = %path.display(),
        bytes = bytes.len(),
        checksum = %checksum,
        "Artifact written"
    );
    Ok(checksum)
}

/// Read and validate the artifact at `path`
pub fn load(path: &Path) -> Result<LoadedArtifact, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ArtifactError::NotFound(path.to_path_buf()),
        _ => io_error(path, e),
    })?;

    let checksum = compute_checksum(&bytes);
    let artifact: PipelineArtifact =
        serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    artifact.check_schema()?;

    debug!(path = %path.display(), checksum = %checksum, "Artifact loaded");

    Ok(LoadedArtifact {
        artifact,
        checksum,
        path: path.to_path_buf(),
    })
}
