//! Linear temperature model

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::training::{fit_least_squares, TrainingDataset};
use super::ModelMetadata;
use crate::domain::FeatureColumn;
use crate::forecast::FeatureFrame;

/// Fitted linear regression: `y = intercept + Σ coefficients[i] * x[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub metadata: ModelMetadata,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressionModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64, metadata: ModelMetadata) -> Self {
        Self {
            metadata,
            coefficients,
            intercept,
        }
    }

    /// Fit on a training set. Feature names are taken from the dataset, in
    /// column order.
    pub fn fit(dataset: &TrainingDataset) -> Result<Self> {
        let (coefficients, intercept) = fit_least_squares(&dataset.features, &dataset.targets)?;
        let trained_at = Utc::now();
        let metadata = ModelMetadata {
            model_id: format!("linear_regression_{}", trained_at.format("%Y%m%d_%H%M%S")),
            trained_at,
            training_samples: dataset.len(),
            validation_metrics: None,
            feature_names: dataset.feature_names.clone(),
        };
        Ok(Self::new(coefficients, intercept, metadata))
    }

    pub fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }

    /// (feature name, coefficient) in fit order.
    pub fn named_coefficients(&self) -> Vec<(String, f64)> {
        self.feature_names()
            .iter()
            .cloned()
            .zip(self.coefficients.iter().copied())
            .collect()
    }

    pub fn predict_row(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                features.len()
            );
        }

        Ok(features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept)
    }

    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    /// Predict every row of a feature frame, picking columns by the names the
    /// model was fit on.
    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let columns = self
            .feature_names()
            .iter()
            .map(|name| {
                FeatureColumn::from_str(name)
                    .map_err(|_| anyhow!("model feature `{name}` is not a known feature column"))
            })
            .collect::<Result<Vec<_>>>()?;
        let dataset = TrainingDataset::from_frame(frame, &columns)?;
        self.predict_rows(&dataset.features)
    }
}
