use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Columns of a weather frame, in frame order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WeatherColumn {
    City,
    Timestamp,
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WeatherCondition,
}

/// Columns derived by the feature builder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    Display, AsRefStr, EnumIter, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FeatureColumn {
    Hour,
    DayOfWeek,
    Month,
    #[strum(serialize = "temp_lag_1")]
    #[serde(rename = "temp_lag_1")]
    TempLag1,
    #[strum(serialize = "temp_lag_2")]
    #[serde(rename = "temp_lag_2")]
    TempLag2,
    TempRollingMean,
    TempRollingStd,
}

impl FeatureColumn {
    /// Regressors used by the temperature model, in fit order.
    pub const MODEL_INPUTS: [FeatureColumn; 5] = [
        FeatureColumn::Hour,
        FeatureColumn::DayOfWeek,
        FeatureColumn::TempLag1,
        FeatureColumn::TempLag2,
        FeatureColumn::TempRollingMean,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_column_names() {
        assert_eq!(WeatherColumn::WindSpeed.to_string(), "wind_speed");
        assert_eq!(FeatureColumn::TempLag1.as_ref(), "temp_lag_1");
        assert_eq!(FeatureColumn::TempRollingMean.to_string(), "temp_rolling_mean");
        assert_eq!(FeatureColumn::from_str("day_of_week").unwrap(), FeatureColumn::DayOfWeek);
    }

    #[test]
    fn test_column_counts() {
        assert_eq!(WeatherColumn::iter().count(), 7);
        assert_eq!(FeatureColumn::iter().count(), 7);
    }
}
