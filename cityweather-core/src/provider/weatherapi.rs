use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::{
    error::WeatherError,
    model::{CurrentConditions, Forecast, ForecastDay, Location},
    prefs::ForecastDays,
};

use super::{WeatherClient, validate_coordinates};

/// Client for the WeatherAPI.com `current.json` and `forecast.json` endpoints.
#[derive(Clone)]
pub struct WeatherApiClient {
    api_key: Option<String>,
    base_url: String,
    http: Client,
}

// Keeps the key out of debug output and logs.
impl std::fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherApiClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl WeatherApiClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
            http: Client::new(),
        }
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or_else(WeatherError::missing_api_key)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let key = self.api_key()?;
        let url = format!("{}/{endpoint}", self.base_url);

        debug!(%url, "sending WeatherAPI request");

        let res = self
            .http
            .get(&url)
            .query(&[("key", key)])
            .query(params)
            .send()
            .await
            .map_err(|e| WeatherError::Connectivity(e.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| WeatherError::Connectivity(e.without_url().to_string()))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "WeatherAPI request failed");
            return Err(WeatherError::transport(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::Decode(format!("{endpoint}: {e}")))
    }
}

#[async_trait]
impl WeatherClient for WeatherApiClient {
    #[instrument(skip(self), fields(lat = %lat, lon = %lon))]
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, WeatherError> {
        self.api_key()?;
        validate_coordinates(lat, lon)?;

        let parsed: WaCurrentResponse = self
            .request(
                "current.json",
                &[("q", format!("{lat},{lon}")), ("aqi", "no".to_string())],
            )
            .await?;

        let current = parsed.current;
        Ok(CurrentConditions {
            temperature_c: current.temp_c,
            temperature_f: current.temp_f,
            feels_like_c: current.feelslike_c,
            feels_like_f: current.feelslike_f,
            humidity_pct: current.humidity,
            wind_kph: current.wind_kph,
            wind_mph: current.wind_mph,
            condition_text: current.condition.text,
            condition_icon_url: normalize_icon_url(&current.condition.icon),
            local_time: parsed.location.localtime,
        })
    }

    #[instrument(skip(self), fields(lat = %lat, lon = %lon, days = %days))]
    async fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        days: ForecastDays,
    ) -> Result<Forecast, WeatherError> {
        self.api_key()?;
        validate_coordinates(lat, lon)?;

        let parsed: WaForecastResponse = self
            .request(
                "forecast.json",
                &[
                    ("q", format!("{lat},{lon}")),
                    ("days", days.to_string()),
                    ("aqi", "no".to_string()),
                    ("alerts", "no".to_string()),
                ],
            )
            .await?;

        let mut forecast_days = parsed
            .forecast
            .forecastday
            .into_iter()
            .map(|d| ForecastDay {
                date: d.date,
                max_temp_c: d.day.maxtemp_c,
                max_temp_f: d.day.maxtemp_f,
                min_temp_c: d.day.mintemp_c,
                min_temp_f: d.day.mintemp_f,
                condition_icon_url: normalize_icon_url(&d.day.condition.icon),
                condition_text: d.day.condition.text,
            })
            .collect::<Vec<_>>();

        forecast_days.sort_by_key(|d| d.date);
        forecast_days.truncate(usize::from(days.get()));

        Ok(Forecast {
            location: Location {
                name: parsed.location.name,
                region: parsed.location.region,
                country: parsed.location.country,
                local_time: parsed.location.localtime,
            },
            days: forecast_days,
        })
    }
}

/// WeatherAPI serves icons as protocol-relative URLs (`//cdn.weatherapi.com/...`).
fn normalize_icon_url(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{icon}")
    } else {
        icon.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    region: String,
    country: String,
    #[serde(default)]
    localtime: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    humidity: u8,
    wind_kph: f64,
    wind_mph: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    maxtemp_f: f64,
    mintemp_c: f64,
    mintemp_f: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    forecast: WaForecast,
}
