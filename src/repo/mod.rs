use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::domain::{Observation, WeatherFrame};

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::InMemoryWeatherRepository;
#[cfg(feature = "db")]
pub use pg::PgWeatherRepository;

/// Row store for weather observations, keyed on `(city, timestamp)`.
///
/// Inserts are upserts: writing a record whose key already exists replaces
/// the stored values.
#[async_trait]
pub trait WeatherRepository: Send + Sync {
    /// Create the backing table if it does not exist yet.
    async fn ensure_schema(&self) -> Result<()>;

    async fn insert(&self, record: &Observation) -> Result<()>;

    /// Write many records in one round trip. All or nothing.
    async fn insert_batch(&self, records: &[Observation]) -> Result<u64>;

    /// Remove every row for `city`, returning how many were removed.
    async fn delete_city(&self, city: &str) -> Result<u64>;

    /// Rows for `city` inside the trailing `days` window, oldest first.
    /// An empty frame is not an error.
    async fn query_window(&self, city: &str, days: u32) -> Result<WeatherFrame>;
}

/// Start of the trailing window: midnight UTC today minus `days`.
pub fn window_start(days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    midnight - Duration::days(days as i64)
}

/// Drop all but the last record per `(city, timestamp)` key, keeping order.
pub(crate) fn dedupe_by_key(records: &[Observation]) -> Vec<&Observation> {
    let mut out: Vec<&Observation> = Vec::with_capacity(records.len());
    for record in records {
        match out
            .iter()
            .position(|r| r.city == record.city && r.timestamp == record.timestamp)
        {
            Some(idx) => out[idx] = record,
            None => out.push(record),
        }
    }
    out
}

/// Open the configured store.
pub async fn connect(cfg: &Config) -> Result<Arc<dyn WeatherRepository>> {
    #[cfg(feature = "db")]
    {
        let repo = PgWeatherRepository::connect(&cfg.db).await?;
        repo.ensure_schema().await?;
        Ok(Arc::new(repo))
    }

    #[cfg(not(feature = "db"))]
    {
        let _ = cfg;
        tracing::warn!("built without the `db` feature; using the in-memory store");
        Ok(Arc::new(InMemoryWeatherRepository::new()))
    }
}
