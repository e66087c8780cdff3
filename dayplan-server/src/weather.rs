//! Ambient weather poller.
//!
//! A background job that fetches the hourly forecast from OpenWeather
//! on a timer and records it as per-day JSON files under
//! `<data_dir>/weather/`, written with the same temp-and-rename
//! discipline as task files. The records are independent of the task
//! store; the gateway reads them back for the `/api/weather` route.
//! Fetch failures are logged and never fatal.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use dayplan_core::store;

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// Errors from fetching or recording weather data.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    /// The forecast request failed.
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A weather file or directory could not be accessed.
    #[error("{path}: {source}")]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A weather record could not be serialized or parsed.
    #[error("weather record malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// A weather record could not be written.
    #[error(transparent)]
    Write(#[from] store::StoreError),
}

/// Display payload for one recorded hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherData {
    /// Material Design icon name for the client.
    pub icon: String,
    /// Human-readable conditions, e.g. `light rain`.
    pub description: String,
}

/// One recorded forecast hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyWeather {
    /// Calendar date, `YYYY-MM-DD`, local time.
    pub date: String,
    /// Hour of day, 0-23.
    pub hour: u32,
    /// Conditions for that hour.
    pub data: WeatherData,
}

// ---------------------------------------------------------------------------
// OpenWeather response shapes (only the fields we use)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    hourly: Vec<HourlyForecast>,
}

#[derive(Debug, Deserialize)]
struct HourlyForecast {
    dt: i64,
    #[serde(default)]
    weather: Vec<ForecastConditions>,
}

#[derive(Debug, Deserialize)]
struct ForecastConditions {
    icon: String,
    description: String,
}

/// Maps an OpenWeather icon code to a Material Design icon name.
fn material_icon(code: &str) -> &'static str {
    match code {
        "01d" => "bedtime",
        "01n" => "clear_day",
        "02d" => "partly_cloudy_day",
        "02n" => "partly_cloudy_night",
        "03d" | "03n" | "04d" | "04n" => "cloud",
        "09d" | "09n" | "10d" | "10n" => "rainy",
        "11d" | "11n" => "thunderstorm",
        "13d" | "13n" => "weather_snowy",
        "50d" | "50n" => "foggy",
        _ => "cloud",
    }
}

/// Converts a forecast response into recorded hours grouped by local
/// date. Hours without a conditions entry are skipped.
fn hours_by_date(hourly: &[HourlyForecast]) -> BTreeMap<String, Vec<HourlyWeather>> {
    let mut by_date: BTreeMap<String, Vec<HourlyWeather>> = BTreeMap::new();

    for forecast in hourly {
        let Some(conditions) = forecast.weather.first() else {
            continue;
        };
        let Some(at) = Local.timestamp_opt(forecast.dt, 0).single() else {
            continue;
        };

        let date = at.format("%Y-%m-%d").to_string();
        by_date.entry(date.clone()).or_default().push(HourlyWeather {
            date,
            hour: chrono::Timelike::hour(&at),
            data: WeatherData {
                icon: material_icon(&conditions.icon).to_string(),
                description: conditions.description.clone(),
            },
        });
    }

    by_date
}

/// Merges newly fetched hours into previously recorded ones: new data
/// replaces the same hour, other hours are kept, result sorted by
/// hour.
fn merge_hours(existing: Vec<HourlyWeather>, fresh: Vec<HourlyWeather>) -> Vec<HourlyWeather> {
    let mut by_hour: BTreeMap<u32, HourlyWeather> =
        existing.into_iter().map(|h| (h.hour, h)).collect();
    for entry in fresh {
        by_hour.insert(entry.hour, entry);
    }
    by_hour.into_values().collect()
}

/// Path of the record file for one date.
fn record_path(weather_dir: &Path, date: &str) -> PathBuf {
    weather_dir.join(format!("{date}.json"))
}

/// Returns the recorded hours for `date`, empty if nothing has been
/// recorded yet.
///
/// # Errors
///
/// Returns [`WeatherError`] on I/O failure other than not-found, or
/// if the record file is malformed.
pub async fn read_for_date(weather_dir: &Path, date: &str) -> Result<Vec<HourlyWeather>, WeatherError> {
    let path = record_path(weather_dir, date);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(WeatherError::Io { path, source: e }),
    }
}

/// Records `fresh` hours for `date`, merging with any previous record
/// and writing atomically.
async fn record_for_date(
    weather_dir: &Path,
    date: &str,
    fresh: Vec<HourlyWeather>,
) -> Result<(), WeatherError> {
    let merged = merge_hours(read_for_date(weather_dir, date).await?, fresh);
    let bytes = serde_json::to_vec(&merged)?;
    store::write_atomic(&record_path(weather_dir, date), &bytes).await?;
    Ok(())
}

/// Background weather poller.
pub struct WeatherService {
    client: reqwest::Client,
    api_key: String,
    latitude: f64,
    longitude: f64,
    weather_dir: PathBuf,
    poll_interval: Duration,
}

impl WeatherService {
    /// Builds a service from the resolved config, or `None` when no
    /// API key is configured.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Option<Self> {
        let api_key = config.weather.api_key.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_key,
            latitude: config.weather.latitude,
            longitude: config.weather.longitude,
            weather_dir: config.data_dir.join("weather"),
            poll_interval: config.weather.poll_interval,
        })
    }

    /// Fetches the hourly forecast once and records it, returning the
    /// number of hours recorded.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError`] if the request or any record write
    /// fails.
    pub async fn fetch_once(&self) -> Result<usize, WeatherError> {
        let response: OneCallResponse = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("exclude", "minutely,daily,alerts".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tokio::fs::create_dir_all(&self.weather_dir)
            .await
            .map_err(|e| WeatherError::Io {
                path: self.weather_dir.clone(),
                source: e,
            })?;

        let mut recorded = 0;
        for (date, hours) in hours_by_date(&response.hourly) {
            recorded += hours.len();
            record_for_date(&self.weather_dir, &date, hours).await?;
        }
        Ok(recorded)
    }

    /// Spawns the polling loop: one immediate fetch, then one per
    /// poll interval. Errors are logged, never propagated.
    pub fn spawn_poller(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.poll_interval);
            loop {
                tick.tick().await;
                match self.fetch_once().await {
                    Ok(recorded) => {
                        tracing::debug!(hours = recorded, "weather data updated");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "weather fetch failed");
                    }
                }
            }
        })
    }
}
