//! Model artifacts on disk
//!
//! One bincode file per training run, named
//! `weather_model_<YYYYMMDD_HHMMSS>.bin` after the moment it was saved.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::LinearRegressionModel;
use crate::error::PipelineError;

pub const ARTIFACT_PREFIX: &str = "weather_model_";
pub const ARTIFACT_EXTENSION: &str = "bin";
pub const TRAINING_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: LinearRegressionModel,
    /// Feature names in the order the model was fit on
    pub features: Vec<String>,
    /// Columns of the frame the forecaster was built from
    pub input_columns: Vec<String>,
    pub training_date: String,
}

impl ModelArtifact {
    pub fn file_name(training_date: &str) -> String {
        format!("{ARTIFACT_PREFIX}{training_date}.{ARTIFACT_EXTENSION}")
    }

    /// Write under `dir`, creating it if needed. Returns the file path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("create model dir {}", dir.display()))?;
        let path = dir.join(Self::file_name(&self.training_date));
        let bytes = bincode::serialize(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize model: {}", e))?;
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "Model saved");
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let artifact: ModelArtifact = bincode::deserialize(&bytes)
            .map_err(|e| PipelineError::Artifact(format!("{}: {}", path.display(), e)))?;
        if artifact.features.len() != artifact.model.coefficients.len() {
            return Err(PipelineError::Artifact(format!(
                "{}: {} feature names for {} coefficients",
                path.display(),
                artifact.features.len(),
                artifact.model.coefficients.len()
            ))
            .into());
        }
        Ok(artifact)
    }
}

/// Most recent artifact in `dir`, if any. Training dates sort
/// lexicographically, so the last file name wins.
pub fn latest_artifact(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut artifacts: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION)
                && p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX))
        })
        .collect();
    artifacts.sort();
    Ok(artifacts.pop())
}
