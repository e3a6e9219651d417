//! End-to-end run for one city
//!
//! delete -> fetch + persist -> query -> features -> dashboard -> train ->
//! reload the newest artifact.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::PipelineError;
use crate::forecast::{build_features, default_provider, WeatherFetcher};
use crate::ml::{latest_artifact, TrainingReport, WeatherForecaster};
use crate::repo::{self, WeatherRepository};

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Nothing could be fetched or stored for the city
    NoData,
    /// Too few complete rows survived feature engineering
    InsufficientData { rows: usize, required: usize },
    Completed {
        stored: usize,
        rows: usize,
        dashboard_path: PathBuf,
        /// `None` when training failed; the cause has been logged
        training: Option<TrainingReport>,
        /// The newest artifact on disk loaded back successfully
        model_verified: bool,
    },
}

#[derive(Clone)]
pub struct Pipeline {
    cfg: Config,
    fetcher: WeatherFetcher,
    repo: Arc<dyn WeatherRepository>,
}

impl Pipeline {
    pub fn new(cfg: Config, fetcher: WeatherFetcher, repo: Arc<dyn WeatherRepository>) -> Self {
        Self { cfg, fetcher, repo }
    }

    /// Wire the configured provider and store.
    pub async fn from_config(cfg: Config) -> Result<Self> {
        let repo = repo::connect(&cfg).await?;
        let fetcher = WeatherFetcher::new(default_provider(&cfg.provider)?);
        Ok(Self::new(cfg, fetcher, repo))
    }

    /// Run against the configured city.
    pub async fn run_default(&self) -> Result<PipelineOutcome> {
        let city = self.cfg.pipeline.city.clone();
        self.run(&city).await
    }

    pub async fn run(&self, city: &str) -> Result<PipelineOutcome> {
        let days = self.cfg.pipeline.days;
        let min_rows = self.cfg.forecaster.min_rows;

        let removed = self.repo.delete_city(city).await?;
        info!(city, removed, "Cleared previous rows");

        let stored = self
            .fetcher
            .fetch_and_persist(self.repo.as_ref(), city, days)
            .await?;
        if stored == 0 {
            warn!(city, "Could not fetch historical weather data");
            return Ok(PipelineOutcome::NoData);
        }

        let frame = self.repo.query_window(city, days).await?;
        info!(city, rows = frame.len(), "Loaded weather frame");

        let features = match build_features(frame.rows(), min_rows) {
            Ok(features) => features,
            Err(e) => {
                if let Some(&PipelineError::InsufficientData { rows, required }) =
                    e.downcast_ref::<PipelineError>()
                {
                    warn!(city, rows, required, "Not enough data for forecasting");
                    return Ok(PipelineOutcome::InsufficientData { rows, required });
                }
                return Err(e);
            }
        };
        info!(city, rows = features.len(), "Rows after feature engineering");

        let dashboard_path = self.cfg.pipeline.dashboard_path.clone();
        Dashboard::from_features(&features)?.save_svg(&dashboard_path)?;

        let mut forecaster = WeatherForecaster::new(frame, self.cfg.forecaster.clone());
        let training = forecaster.train();
        match &training {
            Some(report) => info!(
                city,
                r2 = report.metrics.r2,
                rmse = report.metrics.rmse,
                mae = report.metrics.mae,
                "Model performance"
            ),
            None => error!(city, "Model training failed"),
        }

        let model_verified = training.is_some() && self.verify_latest_model();

        Ok(PipelineOutcome::Completed {
            stored,
            rows: features.len(),
            dashboard_path,
            training,
            model_verified,
        })
    }

    fn verify_latest_model(&self) -> bool {
        let dir = &self.cfg.forecaster.model_dir;
        match latest_artifact(dir) {
            Ok(Some(path)) => match WeatherForecaster::load(&path) {
                Some(loaded) => {
                    info!(
                        path = %path.display(),
                        features = loaded.features().len(),
                        "Verified saved model"
                    );
                    true
                }
                None => false,
            },
            Ok(None) => {
                warn!(dir = %dir.display(), "No saved model found");
                false
            }
            Err(e) => {
                error!(dir = %dir.display(), "Listing models failed: {e:#}");
                false
            }
        }
    }
}
