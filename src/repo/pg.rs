#![cfg(feature = "db")]
//! Postgres-backed weather store.
//!
//! Each call checks a connection out of the pool and commits on its own;
//! nothing spans calls. Rows are unique on `(city, timestamp)` so re-running
//! an ingestion overwrites instead of duplicating.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

use super::{dedupe_by_key, window_start, WeatherRepository};
use crate::config::DbConfig;
use crate::domain::{Observation, WeatherFrame, WeatherRow};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS weather_data (
    city TEXT NOT NULL,
    timestamp TIMESTAMPTZ NOT NULL,
    temperature DOUBLE PRECISION,
    humidity DOUBLE PRECISION,
    pressure DOUBLE PRECISION,
    wind_speed DOUBLE PRECISION,
    weather_condition TEXT,
    UNIQUE (city, timestamp)
)
"#;

const UPSERT_TAIL: &str = r#"
ON CONFLICT (city, timestamp) DO UPDATE SET
    temperature = EXCLUDED.temperature,
    humidity = EXCLUDED.humidity,
    pressure = EXCLUDED.pressure,
    wind_speed = EXCLUDED.wind_speed,
    weather_condition = EXCLUDED.weather_condition
"#;

pub struct PgWeatherRepository {
    pool: PgPool,
}

impl PgWeatherRepository {
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&cfg.url)
            .await
            .context("Failed to create database pool")?;
        info!("connected to weather database");
        Ok(Self { pool })
    }
}

#[async_trait]
impl WeatherRepository for PgWeatherRepository {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .context("create weather_data")?;
        Ok(())
    }

    async fn insert(&self, record: &Observation) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO weather_data
                (city, timestamp, temperature, humidity, pressure, wind_speed, weather_condition)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            {UPSERT_TAIL}
            "#
        );
        sqlx::query(&sql)
            .bind(&record.city)
            .bind(record.timestamp)
            .bind(record.temperature)
            .bind(record.humidity)
            .bind(record.pressure)
            .bind(record.wind_speed)
            .bind(&record.weather_condition)
            .execute(&self.pool)
            .await
            .context("insert weather_data row")?;
        Ok(())
    }

    async fn insert_batch(&self, records: &[Observation]) -> Result<u64> {
        // One statement cannot touch the same key twice under ON CONFLICT
        let deduped = dedupe_by_key(records);
        if deduped.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO weather_data \
             (city, timestamp, temperature, humidity, pressure, wind_speed, weather_condition) ",
        );
        qb.push_values(deduped, |mut b, r| {
            b.push_bind(r.city.clone())
                .push_bind(r.timestamp)
                .push_bind(r.temperature)
                .push_bind(r.humidity)
                .push_bind(r.pressure)
                .push_bind(r.wind_speed)
                .push_bind(r.weather_condition.clone());
        });
        qb.push(UPSERT_TAIL);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .context("batch insert weather_data")?;
        debug!(rows = result.rows_affected(), "batch upserted");
        Ok(result.rows_affected())
    }

    async fn delete_city(&self, city: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM weather_data WHERE city = $1")
            .bind(city)
            .execute(&self.pool)
            .await
            .context("delete weather_data for city")?;
        Ok(result.rows_affected())
    }

    async fn query_window(&self, city: &str, days: u32) -> Result<WeatherFrame> {
        let rows: Vec<WeatherRow> = sqlx::query_as(
            r#"
            SELECT city, timestamp, temperature, humidity, pressure, wind_speed, weather_condition
            FROM weather_data
            WHERE city = $1 AND timestamp >= $2
            ORDER BY timestamp ASC
            "#,
        )
        .bind(city)
        .bind(window_start(days, Utc::now()))
        .fetch_all(&self.pool)
        .await
        .context("query weather_data window")?;

        Ok(WeatherFrame::new(rows))
    }
}
