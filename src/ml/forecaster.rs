//! Temperature forecaster
//!
//! Owns one weather frame, derives features from it on demand, fits a
//! [`LinearRegressionModel`] and writes the result as a [`ModelArtifact`].

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::artifact::{ModelArtifact, TRAINING_DATE_FORMAT};
use super::{LinearRegressionModel, TrainingDataset};
use crate::config::ForecasterConfig;
use crate::domain::{FeatureColumn, WeatherFrame};
use crate::error::PipelineError;
use crate::forecast::{build_features, FeatureFrame, ForecastMetrics};

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Hold-out metrics
    pub metrics: ForecastMetrics,
    /// (feature, coefficient) in fit order
    pub coefficients: Vec<(String, f64)>,
    pub intercept: f64,
    pub model_path: PathBuf,
}

pub struct WeatherForecaster {
    data: WeatherFrame,
    config: ForecasterConfig,
    prepared: Option<FeatureFrame>,
    model: Option<LinearRegressionModel>,
    features: Vec<String>,
    training_date: Option<String>,
}

impl WeatherForecaster {
    pub fn new(data: WeatherFrame, config: ForecasterConfig) -> Self {
        Self {
            data,
            config,
            prepared: None,
            model: None,
            features: Vec::new(),
            training_date: None,
        }
    }

    pub fn data(&self) -> &WeatherFrame {
        &self.data
    }

    pub fn model(&self) -> Option<&LinearRegressionModel> {
        self.model.as_ref()
    }

    /// Feature names the current model expects, in order.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn training_date(&self) -> Option<&str> {
        self.training_date.as_deref()
    }

    /// Derive the feature frame from the held data. Computed once per
    /// instance; later calls return the cached frame.
    pub fn prepare_features(&mut self) -> Result<&FeatureFrame> {
        if self.prepared.is_none() {
            let frame = build_features(self.data.rows(), self.config.min_rows)?;
            self.prepared = Some(frame);
        }
        self.prepared
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("feature frame missing after preparation"))
    }

    /// Train, evaluate on the hold-out split and save the model.
    pub fn try_train(&mut self) -> Result<TrainingReport> {
        let test_ratio = self.config.test_ratio;
        let seed = self.config.seed;

        let dataset = {
            let frame = self.prepare_features()?;
            let columns: Vec<FeatureColumn> = FeatureColumn::MODEL_INPUTS
                .into_iter()
                .filter(|c| frame.has_column(c.as_ref()))
                .collect();
            TrainingDataset::from_frame(frame, &columns)?
        };

        let (train, test) = dataset.split(test_ratio, seed)?;
        info!(
            train_rows = train.len(),
            test_rows = test.len(),
            features = ?dataset.feature_names,
            "Training temperature model"
        );

        let mut model = LinearRegressionModel::fit(&train)?;
        let predicted = model.predict_rows(&test.features)?;
        let metrics = ForecastMetrics::calculate(&test.targets, &predicted)?;
        model.metadata.validation_metrics = Some(metrics);

        info!(
            r2 = metrics.r2,
            rmse = metrics.rmse,
            mae = metrics.mae,
            intercept = model.intercept,
            "Model evaluated"
        );

        let coefficients = model.named_coefficients();
        let intercept = model.intercept;
        let features = model.feature_names().to_vec();
        let previous_model = self.model.replace(model);
        let previous_features = std::mem::replace(&mut self.features, features);

        let model_path = match self.save() {
            Ok(path) => path,
            Err(e) => {
                self.model = previous_model;
                self.features = previous_features;
                return Err(e);
            }
        };

        Ok(TrainingReport {
            metrics,
            coefficients,
            intercept,
            model_path,
        })
    }

    /// Single training attempt. Any failure is logged and yields `None`.
    pub fn train(&mut self) -> Option<TrainingReport> {
        match self.try_train() {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Model training failed");
                None
            }
        }
    }

    /// Save into the configured model directory.
    pub fn save(&mut self) -> Result<PathBuf> {
        let dir = self.config.model_dir.clone();
        self.save_to(&dir)
    }

    pub fn save_to(&mut self, dir: &Path) -> Result<PathBuf> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        let training_date = Utc::now().format(TRAINING_DATE_FORMAT).to_string();

        let artifact = ModelArtifact {
            model: model.clone(),
            features: model.feature_names().to_vec(),
            input_columns: WeatherFrame::columns(),
            training_date: training_date.clone(),
        };
        let path = artifact.write(dir)?;
        self.training_date = Some(training_date);
        Ok(path)
    }

    /// Restore a forecaster from an artifact. The instance holds no data;
    /// predictions need a feature frame supplied by the caller.
    pub fn try_load(path: &Path) -> Result<Self> {
        let artifact = ModelArtifact::read(path)
            .with_context(|| format!("load model from {}", path.display()))?;

        let config = ForecasterConfig {
            model_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            ..ForecasterConfig::default()
        };
        info!(
            path = %path.display(),
            training_date = %artifact.training_date,
            "Model loaded"
        );

        Ok(Self {
            data: WeatherFrame::default(),
            config,
            prepared: None,
            model: Some(artifact.model),
            features: artifact.features,
            training_date: Some(artifact.training_date),
        })
    }

    pub fn load(path: &Path) -> Option<Self> {
        match Self::try_load(path) {
            Ok(forecaster) => Some(forecaster),
            Err(e) => {
                error!(error = ?e, "Model load failed");
                None
            }
        }
    }

    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelNotTrained)?;
        model.predict(frame)
    }

    /// Multi-step forecasting is not supported.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>> {
        warn!(steps, "Multi-step forecast requested");
        Err(PipelineError::NotImplemented("multi-step forecast").into())
    }
}
