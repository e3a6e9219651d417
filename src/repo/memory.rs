//! In-process weather store with the same upsert and window semantics as the
//! Postgres repository.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{dedupe_by_key, window_start, WeatherRepository};
use crate::domain::{Observation, WeatherFrame, WeatherRow};

#[derive(Default)]
pub struct InMemoryWeatherRepository {
    rows: RwLock<BTreeMap<(String, DateTime<Utc>), WeatherRow>>,
}

impl InMemoryWeatherRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl WeatherRepository for InMemoryWeatherRepository {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert(&self, record: &Observation) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(
            (record.city.clone(), record.timestamp),
            WeatherRow::from(record.clone()),
        );
        Ok(())
    }

    async fn insert_batch(&self, records: &[Observation]) -> Result<u64> {
        let deduped = dedupe_by_key(records);
        let mut rows = self.rows.write().await;
        for record in &deduped {
            rows.insert(
                (record.city.clone(), record.timestamp),
                WeatherRow::from((*record).clone()),
            );
        }
        Ok(deduped.len() as u64)
    }

    async fn delete_city(&self, city: &str) -> Result<u64> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|(c, _), _| c != city);
        Ok((before - rows.len()) as u64)
    }

    async fn query_window(&self, city: &str, days: u32) -> Result<WeatherFrame> {
        let start = window_start(days, Utc::now());
        let rows = self.rows.read().await;
        // BTreeMap order within one city is timestamp ascending
        Ok(rows
            .iter()
            .filter(|((c, ts), _)| c == city && *ts >= start)
            .map(|(_, row)| row.clone())
            .collect())
    }
}
