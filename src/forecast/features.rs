//! Feature engineering for the temperature model
//!
//! [`build_features`] is the single place that turns stored weather rows into
//! model inputs. The orchestrator, the dashboard and the forecaster all go
//! through it.
//!
//! Derivation order matters: rows are sorted by timestamp before any lag or
//! rolling value is computed.

use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tracing::debug;

use crate::domain::{FeatureColumn, Observation, WeatherColumn, WeatherRow};
use crate::error::PipelineError;

/// Trailing window length for rolling statistics
pub const ROLLING_WINDOW: usize = 3;

/// One complete row of the feature frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub wind_speed: Option<f64>,
    pub weather_condition: Option<String>,
    pub hour: u32,
    /// 0 = Monday
    pub day_of_week: u32,
    pub month: u32,
    pub temp_lag_1: f64,
    pub temp_lag_2: f64,
    pub temp_rolling_mean: f64,
    /// Undefined until the window holds two temperatures
    pub temp_rolling_std: Option<f64>,
}

impl FeatureRow {
    /// Value of a numeric feature column.
    pub fn feature(&self, column: FeatureColumn) -> Option<f64> {
        match column {
            FeatureColumn::Hour => Some(self.hour as f64),
            FeatureColumn::DayOfWeek => Some(self.day_of_week as f64),
            FeatureColumn::Month => Some(self.month as f64),
            FeatureColumn::TempLag1 => Some(self.temp_lag_1),
            FeatureColumn::TempLag2 => Some(self.temp_lag_2),
            FeatureColumn::TempRollingMean => Some(self.temp_rolling_mean),
            FeatureColumn::TempRollingStd => self.temp_rolling_std,
        }
    }
}

/// Weather frame extended with calendar, lag and rolling columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, weather columns first.
    pub fn columns(&self) -> Vec<String> {
        WeatherColumn::iter()
            .map(|c| c.to_string())
            .chain(FeatureColumn::iter().map(|c| c.to_string()))
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns().iter().any(|c| c == name)
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.temperature).collect()
    }

    /// Values of one feature column; undefined cells come back as NaN.
    pub fn column(&self, column: FeatureColumn) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.feature(column).unwrap_or(f64::NAN))
            .collect()
    }

    /// Re-run derivation over this frame. Lag and rolling values already on
    /// the rows are kept, so rows dropped upstream do not shift the windows.
    pub fn rebuild(&self, min_rows: usize) -> Result<FeatureFrame> {
        build_features(&self.rows, min_rows)
    }
}

/// Derived values a row already carries from an earlier derivation.
#[derive(Debug, Clone, Copy)]
pub struct CarriedFeatures {
    pub temp_lag_1: f64,
    pub temp_lag_2: f64,
    pub temp_rolling_mean: f64,
    pub temp_rolling_std: Option<f64>,
}

/// Anything the feature builder can consume.
pub trait FeatureSource {
    fn weather_row(&self) -> WeatherRow;

    fn carried(&self) -> Option<CarriedFeatures> {
        None
    }
}

impl FeatureSource for WeatherRow {
    fn weather_row(&self) -> WeatherRow {
        self.clone()
    }
}

impl FeatureSource for Observation {
    fn weather_row(&self) -> WeatherRow {
        WeatherRow::from(self.clone())
    }
}

impl FeatureSource for FeatureRow {
    fn weather_row(&self) -> WeatherRow {
        WeatherRow {
            city: self.city.clone(),
            timestamp: self.timestamp,
            temperature: Some(self.temperature),
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
            weather_condition: self.weather_condition.clone(),
        }
    }

    fn carried(&self) -> Option<CarriedFeatures> {
        Some(CarriedFeatures {
            temp_lag_1: self.temp_lag_1,
            temp_lag_2: self.temp_lag_2,
            temp_rolling_mean: self.temp_rolling_mean,
            temp_rolling_std: self.temp_rolling_std,
        })
    }
}

/// Derive the feature frame from weather rows.
///
/// Fails with [`PipelineError::InsufficientData`] when fewer than `min_rows`
/// complete rows survive.
pub fn build_features<S: FeatureSource>(source: &[S], min_rows: usize) -> Result<FeatureFrame> {
    debug!(rows = source.len(), "building features");

    let mut staged: Vec<(WeatherRow, Option<CarriedFeatures>)> = source
        .iter()
        .map(|s| (coerce_numeric(s.weather_row()), s.carried()))
        .collect();
    staged.sort_by_key(|(row, _)| row.timestamp);

    let temps: Vec<Option<f64>> = staged.iter().map(|(row, _)| row.temperature).collect();
    let carried: Vec<Option<CarriedFeatures>> = staged.iter().map(|(_, c)| *c).collect();

    let lag_1 = lag_series(&temps, 1, |i| carried[i].map(|c| c.temp_lag_1));
    let lag_2 = lag_series(&temps, 2, |i| carried[i].map(|c| c.temp_lag_2));
    let rolling = rolling_series(&temps, &carried);

    let rows: Vec<FeatureRow> = staged
        .into_iter()
        .enumerate()
        .filter_map(|(i, (row, _))| {
            let temperature = row.temperature?;
            let (temp_rolling_mean, temp_rolling_std) = rolling[i];
            Some(FeatureRow {
                hour: row.timestamp.hour(),
                day_of_week: row.timestamp.weekday().num_days_from_monday(),
                month: row.timestamp.month(),
                temp_lag_1: lag_1[i]?,
                temp_lag_2: lag_2[i]?,
                temp_rolling_mean: temp_rolling_mean?,
                temp_rolling_std,
                city: row.city,
                timestamp: row.timestamp,
                temperature,
                humidity: row.humidity,
                pressure: row.pressure,
                wind_speed: row.wind_speed,
                weather_condition: row.weather_condition,
            })
        })
        .collect();

    debug!(rows = rows.len(), "feature rows after dropping incomplete");

    if rows.len() < min_rows {
        return Err(PipelineError::InsufficientData {
            rows: rows.len(),
            required: min_rows,
        }
        .into());
    }

    Ok(FeatureFrame { rows })
}

fn coerce_numeric(mut row: WeatherRow) -> WeatherRow {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    row.temperature = finite(row.temperature);
    row.humidity = finite(row.humidity);
    row.pressure = finite(row.pressure);
    row.wind_speed = finite(row.wind_speed);
    row
}

/// Value `offset` rows earlier, forward-filled. A carried value always wins;
/// positions before the frame start without one stay undefined.
fn lag_series(
    values: &[Option<f64>],
    offset: usize,
    carried: impl Fn(usize) -> Option<f64>,
) -> Vec<Option<f64>> {
    let mut last = None;
    (0..values.len())
        .map(|i| {
            let raw = match carried(i) {
                Some(v) => Some(v),
                None if i >= offset => values[i - offset],
                None => None,
            };
            let filled = raw.or(last);
            if filled.is_some() {
                last = filled;
            }
            filled
        })
        .collect()
}

fn rolling_series(
    values: &[Option<f64>],
    carried: &[Option<CarriedFeatures>],
) -> Vec<(Option<f64>, Option<f64>)> {
    (0..values.len())
        .map(|i| {
            if let Some(c) = carried[i] {
                return (Some(c.temp_rolling_mean), c.temp_rolling_std);
            }
            let start = (i + 1).saturating_sub(ROLLING_WINDOW);
            let window: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            (mean(&window), sample_std(&window))
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
