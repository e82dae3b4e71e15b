//! Daily forecast via the Open-Meteo forecast API.

use async_trait::async_trait;
use chrono::NaiveDate;
use citycast_core::ServiceConfig;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::geocode::USER_AGENT;
use crate::labels::LabelTable;
use crate::types::{round_temperature, Coordinates, DayForecast, ForecastError, ForecastSummary};

/// Number of days shown on a card: today, tomorrow, the day after.
pub const FORECAST_DAYS: usize = 3;

const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,weathercode";

/// Source of short-range forecasts for a position.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, coordinates: Coordinates) -> Result<ForecastSummary, ForecastError>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_min: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    weathercode: Vec<Option<f64>>,
}

/// Build the card rows from the aligned daily arrays. Reads only indices
/// present in every array and stops at the first unusable day.
fn summarize(daily: &DailyBlock, labels: &dyn LabelTable) -> Result<ForecastSummary, ForecastError> {
    let available = FORECAST_DAYS
        .min(daily.time.len())
        .min(daily.temperature_2m_min.len())
        .min(daily.temperature_2m_max.len())
        .min(daily.weathercode.len());

    let mut days = Vec::with_capacity(available);
    for offset in 0..available {
        let Ok(date) = NaiveDate::parse_from_str(&daily.time[offset], "%Y-%m-%d") else {
            tracing::warn!("Unparsable forecast date: {}", daily.time[offset]);
            break;
        };
        let (Some(min), Some(max)) = (
            daily.temperature_2m_min[offset],
            daily.temperature_2m_max[offset],
        ) else {
            break;
        };
        let weather_code = daily.weathercode[offset].map(|c| c as i32);

        days.push(DayForecast {
            date,
            date_label: labels.date_label(offset, date),
            min_temp: round_temperature(min),
            max_temp: round_temperature(max),
            weather_code,
            description: labels.describe(weather_code),
        });
    }

    if days.is_empty() {
        return Err(ForecastError::Unavailable("no daily data".to_string()));
    }
    Ok(ForecastSummary { days })
}

/// HTTP client for the forecast API
#[derive(Clone)]
pub struct ForecastClient {
    client: Client,
    base_url: String,
    labels: Arc<dyn LabelTable>,
}

impl ForecastClient {
    pub fn new(config: &ServiceConfig, labels: Arc<dyn LabelTable>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.forecast_url.trim_end_matches('/').to_string(),
            labels,
        })
    }
}

impl std::fmt::Debug for ForecastClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ForecastSource for ForecastClient {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, coordinates: Coordinates) -> Result<ForecastSummary, ForecastError> {
        let url = format!("{}/v1/forecast", self.base_url);
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("daily", DAILY_FIELDS),
                ("timezone", "auto"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Forecast returned status {}", status);
            return Err(ForecastError::Unavailable(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let body: ForecastResponse = response.json().await.map_err(|e| {
            tracing::warn!("Forecast parse error: {}", e);
            ForecastError::Unavailable(format!("malformed forecast: {}", e))
        })?;

        let daily = body
            .daily
            .ok_or_else(|| ForecastError::Unavailable("missing daily data".to_string()))?;

        summarize(&daily, self.labels.as_ref())
    }
}
