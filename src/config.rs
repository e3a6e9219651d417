use anyhow::Result;
use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub db: DbConfig,
    pub pipeline: PipelineConfig,
    pub forecaster: ForecasterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub http_timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://archive-api.open-meteo.com".to_string(),
            http_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost/weather_retail_db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub city: String,
    pub days: u32,
    pub dashboard_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            city: "Mumbai".to_string(),
            days: 30,
            dashboard_path: PathBuf::from("dashboard.svg"),
        }
    }
}

/// Training knobs for [`crate::ml::WeatherForecaster`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecasterConfig {
    pub model_dir: PathBuf,
    /// Share of rows held out for evaluation (0, 1)
    pub test_ratio: f64,
    pub seed: u64,
    /// Fewer complete rows than this after feature engineering is a hard stop
    pub min_rows: usize,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            test_ratio: 0.3,
            seed: 42,
            min_rows: 8,
        }
    }
}

impl Config {
    /// Defaults, then `config/default.toml`, then `WXP__SECTION__KEY` env vars.
    pub fn load() -> Result<Self> {
        Self::load_from(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml")),
        )
    }

    fn load_from(figment: Figment) -> Result<Self> {
        let cfg: Config = figment
            .merge(Env::prefixed("WXP__").split("__"))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.pipeline.days == 0 {
            anyhow::bail!("pipeline.days must be at least 1");
        }
        if !(self.forecaster.test_ratio > 0.0 && self.forecaster.test_ratio < 1.0) {
            anyhow::bail!(
                "forecaster.test_ratio must be between 0 and 1, got {}",
                self.forecaster.test_ratio
            );
        }
        if self.forecaster.min_rows < 2 {
            anyhow::bail!("forecaster.min_rows must be at least 2");
        }
        Ok(())
    }
}
