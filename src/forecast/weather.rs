//! Historical weather retrieval
//!
//! Resolves a city to coordinates, pulls daily observations for a trailing
//! window from the provider and normalises each day into an [`Observation`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ProviderConfig;
use crate::domain::Observation;
use crate::repo::WeatherRepository;

/// The provider has no condition field
pub const UNKNOWN_CONDITION: &str = "N/A";

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

const CITY_COORDINATES: &[(&str, GeoLocation)] = &[
    ("Mumbai", GeoLocation { latitude: 19.0760, longitude: 72.8777 }),
    ("Delhi", GeoLocation { latitude: 28.6139, longitude: 77.2090 }),
    ("Bangalore", GeoLocation { latitude: 12.9716, longitude: 77.5946 }),
];

/// Static coordinate lookup; `None` for cities outside the table.
pub fn coordinates(city: &str) -> Option<GeoLocation> {
    CITY_COORDINATES
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, loc)| *loc)
}

/// One provider day. Every measurement may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyObservation {
    pub date: NaiveDate,
    /// Mean temperature, Celsius
    pub tavg: Option<f64>,
    /// Mean relative humidity, percent
    pub rhum: Option<f64>,
    /// Mean sea-level pressure, hPa
    pub pres: Option<f64>,
    /// Mean wind speed, km/h
    pub wspd: Option<f64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Daily rows for `start..=end`, ascending by date.
    async fn daily(
        &self,
        location: GeoLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyObservation>>;
}

/// Open-Meteo historical archive client
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(cfg: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("weather-pipeline/0.1"));
        let client = Client::builder()
            .timeout(cfg.timeout())
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
        })
    }

    fn url(&self, location: GeoLocation, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v1/archive?latitude={:.4}&longitude={:.4}&start_date={}&end_date={}\
             &daily=temperature_2m_mean,relative_humidity_2m_mean,pressure_msl_mean,wind_speed_10m_mean\
             &timezone=UTC",
            self.base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn daily(
        &self,
        location: GeoLocation,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyObservation>> {
        let url = self.url(location, start, end);
        debug!("Fetching daily weather from Open-Meteo: {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to Open-Meteo")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Open-Meteo returned error status: {}", status);
            anyhow::bail!("Open-Meteo API error: HTTP {status}: {body}");
        }

        let archive: ArchiveResponse = resp
            .json()
            .await
            .context("Failed to parse Open-Meteo response")?;
        Ok(archive.daily.into_observations())
    }
}

// Open-Meteo archive response: parallel arrays indexed by day
#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    time: Vec<NaiveDate>,
    #[serde(rename = "temperature_2m_mean", default)]
    temperature: Option<Vec<Option<f64>>>,
    #[serde(rename = "relative_humidity_2m_mean", default)]
    humidity: Option<Vec<Option<f64>>>,
    #[serde(rename = "pressure_msl_mean", default)]
    pressure: Option<Vec<Option<f64>>>,
    #[serde(rename = "wind_speed_10m_mean", default)]
    wind_speed: Option<Vec<Option<f64>>>,
}

impl ArchiveDaily {
    fn into_observations(self) -> Vec<DailyObservation> {
        let at = |col: &Option<Vec<Option<f64>>>, i: usize| {
            col.as_ref().and_then(|v| v.get(i).copied().flatten())
        };
        self.time
            .iter()
            .enumerate()
            .map(|(i, date)| DailyObservation {
                date: *date,
                tavg: at(&self.temperature, i),
                rhum: at(&self.humidity, i),
                pres: at(&self.pressure, i),
                wspd: at(&self.wind_speed, i),
            })
            .collect()
    }
}

/// Fetcher: city name in, normalised observations out.
#[derive(Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Observations for the `days` calendar days ending today, oldest first.
    ///
    /// An unknown city yields an empty list (logged, not an error). Days
    /// without a temperature are skipped.
    pub async fn fetch_window(&self, city: &str, days: u32) -> Result<Vec<Observation>> {
        let Some(location) = coordinates(city) else {
            warn!(city, "Could not get coordinates for city");
            return Ok(Vec::new());
        };
        if days == 0 {
            return Ok(Vec::new());
        }

        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(days as i64 - 1);
        let daily = self.provider.daily(location, start, end).await?;
        let fetched = daily.len();

        let records: Vec<Observation> = daily
            .into_iter()
            .filter(|d| d.date >= start && d.date <= end)
            .filter_map(|d| normalize(city, d))
            .collect();

        info!(city, fetched, kept = records.len(), "fetched daily observations");
        Ok(records)
    }

    /// Fetch, then insert record by record. A failed insert is logged and
    /// skipped; the count covers successful inserts only.
    pub async fn fetch_and_persist(
        &self,
        repo: &dyn WeatherRepository,
        city: &str,
        days: u32,
    ) -> Result<usize> {
        let records = self.fetch_window(city, days).await?;
        let mut stored = 0;
        for record in &records {
            match repo.insert(record).await {
                Ok(()) => stored += 1,
                Err(e) => error!(city, timestamp = %record.timestamp, "Error storing data: {e:#}"),
            }
        }
        info!(city, stored, "Stored {} weather records for {}", stored, city);
        Ok(stored)
    }
}

fn normalize(city: &str, day: DailyObservation) -> Option<Observation> {
    let temperature = day.tavg.filter(|t| t.is_finite())?;
    Some(Observation {
        city: city.to_string(),
        timestamp: day.date.and_time(NaiveTime::MIN).and_utc(),
        temperature,
        humidity: day.rhum,
        pressure: day.pres,
        wind_speed: day.wspd,
        weather_condition: UNKNOWN_CONDITION.to_string(),
    })
}

/// Provider default built from config.
pub fn default_provider(cfg: &ProviderConfig) -> Result<Arc<dyn WeatherProvider>> {
    Ok(Arc::new(OpenMeteoClient::new(cfg)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::InMemoryWeatherRepository;
    use rstest::rstest;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(date: NaiveDate, tavg: Option<f64>) -> DailyObservation {
        DailyObservation { date, tavg, rhum: Some(65.0), pres: None, wspd: Some(9.5) }
    }

    fn days_back(n: i64) -> NaiveDate {
        Utc::now().date_naive() - ChronoDuration::days(n)
    }

    #[rstest]
    #[case("Mumbai", 19.0760, 72.8777)]
    #[case("Delhi", 28.6139, 77.2090)]
    #[case("Bangalore", 12.9716, 77.5946)]
    fn test_known_city_coordinates(#[case] city: &str, #[case] lat: f64, #[case] lon: f64) {
        let loc = coordinates(city).unwrap();
        assert_eq!(loc.latitude, lat);
        assert_eq!(loc.longitude, lon);
        assert_eq!(coordinates(city), Some(loc));
    }

    #[rstest]
    #[case("Paris")]
    #[case("mumbai")]
    #[case("")]
    fn test_unknown_city_coordinates(#[case] city: &str) {
        assert!(coordinates(city).is_none());
    }

    #[tokio::test]
    async fn test_fetch_window_skips_missing_temperature() {
        let mut provider = MockWeatherProvider::new();
        provider.expect_daily().times(1).returning(|_, _, _| {
            Ok(vec![
                day(days_back(3), Some(28.0)),
                day(days_back(2), None),
                day(days_back(1), Some(29.5)),
                day(days_back(0), Some(f64::NAN)),
            ])
        });

        let fetcher = WeatherFetcher::new(Arc::new(provider));
        let records = fetcher.fetch_window("Mumbai", 5).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].temperature, 28.0);
        assert_eq!(records[1].temperature, 29.5);
        assert!(records[0].timestamp < records[1].timestamp);
        assert_eq!(records[0].weather_condition, UNKNOWN_CONDITION);
        assert_eq!(records[0].humidity, Some(65.0));
        assert_eq!(records[0].pressure, None);
    }

    #[tokio::test]
    async fn test_fetch_window_requests_inclusive_range() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_daily()
            .withf(|loc, start, end| {
                loc.latitude == 28.6139 && *end == Utc::now().date_naive() && (*end - *start).num_days() == 6
            })
            .times(1)
            .returning(|_, start, end| {
                // Provider hands back one day too many on each side
                let mut out = Vec::new();
                let mut d = start - ChronoDuration::days(1);
                while d <= end + ChronoDuration::days(1) {
                    out.push(day(d, Some(30.0)));
                    d += ChronoDuration::days(1);
                }
                Ok(out)
            });

        let fetcher = WeatherFetcher::new(Arc::new(provider));
        let records = fetcher.fetch_window("Delhi", 7).await.unwrap();
        assert_eq!(records.len(), 7);
    }

    #[tokio::test]
    async fn test_unknown_city_yields_empty_without_calling_provider() {
        let mut provider = MockWeatherProvider::new();
        provider.expect_daily().never();

        let fetcher = WeatherFetcher::new(Arc::new(provider));
        assert!(fetcher.fetch_window("Gotham", 30).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let mut provider = MockWeatherProvider::new();
        provider
            .expect_daily()
            .returning(|_, _, _| Err(anyhow::anyhow!("upstream down")));

        let fetcher = WeatherFetcher::new(Arc::new(provider));
        assert!(fetcher.fetch_window("Mumbai", 30).await.is_err());
    }

    struct FailingRepo {
        inner: InMemoryWeatherRepository,
        reject: NaiveDate,
    }

    #[async_trait]
    impl WeatherRepository for FailingRepo {
        async fn ensure_schema(&self) -> Result<()> {
            Ok(())
        }
        async fn insert(&self, record: &Observation) -> Result<()> {
            if record.timestamp.date_naive() == self.reject {
                anyhow::bail!("constraint violated");
            }
            self.inner.insert(record).await
        }
        async fn insert_batch(&self, records: &[Observation]) -> Result<u64> {
            self.inner.insert_batch(records).await
        }
        async fn delete_city(&self, city: &str) -> Result<u64> {
            self.inner.delete_city(city).await
        }
        async fn query_window(&self, city: &str, days: u32) -> Result<crate::domain::WeatherFrame> {
            self.inner.query_window(city, days).await
        }
    }

    #[tokio::test]
    async fn test_fetch_and_persist_counts_only_successes() {
        let mut provider = MockWeatherProvider::new();
        provider.expect_daily().returning(|_, _, _| {
            Ok(vec![
                day(days_back(2), Some(27.0)),
                day(days_back(1), Some(28.0)),
                day(days_back(0), Some(29.0)),
            ])
        });
        let repo = FailingRepo { inner: InMemoryWeatherRepository::new(), reject: days_back(1) };

        let fetcher = WeatherFetcher::new(Arc::new(provider));
        let stored = fetcher.fetch_and_persist(&repo, "Bangalore", 3).await.unwrap();

        assert_eq!(stored, 2);
        assert_eq!(repo.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_open_meteo_parses_archive_with_missing_columns() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "latitude": 19.07,
            "longitude": 72.87,
            "daily": {
                "time": ["2024-06-01", "2024-06-02", "2024-06-03"],
                "temperature_2m_mean": [29.1, null, 28.4],
                "wind_speed_10m_mean": [14.2, 15.0, null]
            }
        });
        Mock::given(method("GET"))
            .and(path("/v1/archive"))
            .and(query_param("start_date", "2024-06-01"))
            .and(query_param("end_date", "2024-06-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&ProviderConfig {
            base_url: server.uri(),
            http_timeout_seconds: 5,
        })
        .unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let rows = client
            .daily(coordinates("Mumbai").unwrap(), start, end)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tavg, Some(29.1));
        assert_eq!(rows[1].tavg, None);
        assert_eq!(rows[0].rhum, None);
        assert_eq!(rows[2].wspd, None);
        assert_eq!(rows[1].wspd, Some(15.0));
    }

    #[tokio::test]
    async fn test_open_meteo_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad range"))
            .mount(&server)
            .await;

        let client = OpenMeteoClient::new(&ProviderConfig {
            base_url: server.uri(),
            http_timeout_seconds: 5,
        })
        .unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let err = client.daily(coordinates("Delhi").unwrap(), d, d).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }
}
