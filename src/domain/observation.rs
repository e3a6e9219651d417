use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::WeatherColumn;

/// One city-day reading normalised from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    /// Celsius
    pub temperature: f64,
    /// Percent
    pub humidity: Option<f64>,
    /// hPa
    pub pressure: Option<f64>,
    /// km/h
    pub wind_speed: Option<f64>,
    pub weather_condition: String,
}

/// Persisted form of an [`Observation`] as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WeatherRow {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub weather_condition: Option<String>,
}

impl From<Observation> for WeatherRow {
    fn from(o: Observation) -> Self {
        Self {
            city: o.city,
            timestamp: o.timestamp,
            temperature: Some(o.temperature),
            humidity: o.humidity,
            pressure: o.pressure,
            wind_speed: o.wind_speed,
            weather_condition: Some(o.weather_condition),
        }
    }
}

/// Stored rows for one city over a trailing window, timestamp ascending
/// when produced by a repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherFrame {
    rows: Vec<WeatherRow>,
}

impl WeatherFrame {
    pub fn new(rows: Vec<WeatherRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[WeatherRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns() -> Vec<String> {
        WeatherColumn::iter().map(|c| c.to_string()).collect()
    }
}

impl FromIterator<WeatherRow> for WeatherFrame {
    fn from_iter<I: IntoIterator<Item = WeatherRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<Observation> for WeatherFrame {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(WeatherRow::from).collect())
    }
}
