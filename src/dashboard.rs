//! Temperature dashboard
//!
//! A single time-series panel of temperature against timestamp, rendered to
//! SVG with plotters.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use plotters::coord::types::RangedDateTime;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

use crate::error::PipelineError;
use crate::forecast::FeatureFrame;

const CHART_SIZE: (u32, u32) = (1024, 576);

/// Chart object built from a feature frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub title: String,
    /// (timestamp, temperature), ascending
    pub series: Vec<(DateTime<Utc>, f64)>,
}

impl Dashboard {
    pub fn from_features(frame: &FeatureFrame) -> Result<Self> {
        let first = frame.rows().first().ok_or(PipelineError::EmptyFrame)?;
        let title = format!("Temperature in {}", first.city);
        let series = frame
            .rows()
            .iter()
            .map(|r| (r.timestamp, r.temperature))
            .collect();
        Ok(Self { title, series })
    }

    /// X bounds. A single point gets a day either side.
    pub fn time_range(&self) -> (NaiveDateTime, NaiveDateTime) {
        let (min, max) = self
            .series
            .iter()
            .fold((DateTime::<Utc>::MAX_UTC, DateTime::<Utc>::MIN_UTC), |(lo, hi), (t, _)| {
                (lo.min(*t), hi.max(*t))
            });
        if min >= max {
            return (
                (min - Duration::days(1)).naive_utc(),
                (min + Duration::days(1)).naive_utc(),
            );
        }
        (min.naive_utc(), max.naive_utc())
    }

    /// Y bounds with 10% padding, or 1 °C when the series is flat.
    pub fn temperature_range(&self) -> (f64, f64) {
        let (min, max) = self
            .series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, t)| {
                (lo.min(*t), hi.max(*t))
            });
        let padding = if (max - min).abs() > 1e-6 {
            (max - min) * 0.1
        } else {
            1.0
        };
        (min - padding, max + padding)
    }

    pub fn render_svg(&self) -> Result<String> {
        if self.series.is_empty() {
            return Err(PipelineError::EmptyFrame.into());
        }

        let (x_start, x_end) = self.time_range();
        let (y_start, y_end) = self.temperature_range();
        let points: Vec<(NaiveDateTime, f64)> = self
            .series
            .iter()
            .map(|(t, v)| (t.naive_utc(), *v))
            .collect();

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
            root.fill(&WHITE)?;

            let mut chart = ChartBuilder::on(&root)
                .caption(&self.title, ("sans-serif", 24))
                .margin(12)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(RangedDateTime::from(x_start..x_end), y_start..y_end)?;

            chart
                .configure_mesh()
                .x_desc("Date")
                .y_desc("Temperature (°C)")
                .x_label_formatter(&|dt: &NaiveDateTime| dt.format("%Y-%m-%d").to_string())
                .light_line_style(BLACK.mix(0.15))
                .draw()?;

            chart.draw_series(LineSeries::new(points.iter().copied(), BLUE))?;
            chart.draw_series(
                points
                    .iter()
                    .map(|(t, v)| Circle::new((*t, *v), 3, BLUE.filled())),
            )?;

            root.present()?;
        }
        Ok(svg)
    }

    pub fn save_svg(&self, path: &Path) -> Result<()> {
        let svg = self.render_svg()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(path, svg).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), points = self.series.len(), "Dashboard written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use crate::forecast::build_features;
    use chrono::TimeZone;

    fn features(temps: &[f64]) -> FeatureFrame {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let rows: Vec<Observation> = temps
            .iter()
            .enumerate()
            .map(|(i, t)| Observation {
                city: "Delhi".to_string(),
                timestamp: start + Duration::days(i as i64),
                temperature: *t,
                humidity: None,
                pressure: None,
                wind_speed: None,
                weather_condition: "N/A".to_string(),
            })
            .collect();
        build_features(&rows, 1).unwrap()
    }

    #[test]
    fn test_from_features() {
        let dash = Dashboard::from_features(&features(&[30.0, 31.0, 32.0, 33.0])).unwrap();
        assert_eq!(dash.title, "Temperature in Delhi");
        assert_eq!(dash.series.len(), 2);
        assert_eq!(dash.series[0].1, 32.0);
        assert!(dash.series[0].0 < dash.series[1].0);
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let err = Dashboard::from_features(&FeatureFrame::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EmptyFrame)
        ));
    }

    #[test]
    fn test_ranges() {
        let dash = Dashboard::from_features(&features(&[30.0, 31.0, 30.0, 40.0])).unwrap();
        assert_eq!(dash.temperature_range(), (29.0, 41.0));

        let flat = Dashboard::from_features(&features(&[5.0, 5.0, 5.0])).unwrap();
        assert_eq!(flat.temperature_range(), (4.0, 6.0));
        let (lo, hi) = flat.time_range();
        assert_eq!(hi - lo, Duration::days(2));
    }

    #[test]
    fn test_render_svg() {
        let dash = Dashboard::from_features(&features(&[10.0, 10.5, 11.0, 11.5, 12.0])).unwrap();
        let svg = dash.render_svg().unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Temperature in Delhi"));
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn test_save_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("dashboard.svg");
        let dash = Dashboard::from_features(&features(&[10.0, 11.0, 12.0])).unwrap();
        dash.save_svg(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }
}
