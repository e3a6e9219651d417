//! Machine Learning Module
//!
//! Temperature regression on engineered weather features:
//! - Ordinary least squares fit with a seeded train/test split
//! - Hold-out evaluation (R², RMSE, MAE)
//! - Timestamped model artifacts on disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forecast::ForecastMetrics;

pub mod artifact;
pub mod forecaster;
pub mod models;
pub mod training;

pub use artifact::{latest_artifact, ModelArtifact};
pub use forecaster::{TrainingReport, WeatherForecaster};
pub use models::LinearRegressionModel;
pub use training::{fit_least_squares, TrainingDataset};

/// ML Model Metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    /// Hold-out metrics, filled in after evaluation
    pub validation_metrics: Option<ForecastMetrics>,
    pub feature_names: Vec<String>,
}
