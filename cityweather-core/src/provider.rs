use crate::{
    Config,
    error::WeatherError,
    model::{CurrentConditions, Forecast},
    prefs::ForecastDays,
    provider::weatherapi::WeatherApiClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod weatherapi;

/// Read access to a weather service. Every call goes to the network:
/// no caching, no retries.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<CurrentConditions, WeatherError>;

    async fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        days: ForecastDays,
    ) -> Result<Forecast, WeatherError>;
}

/// Construct the WeatherAPI.com client from config (and the key override
/// in the environment). A missing key is reported on the first fetch.
pub fn client_from_config(config: &Config) -> Arc<dyn WeatherClient> {
    Arc::new(WeatherApiClient::new(config.resolve_api_key(), config.base_url.clone()))
}

pub(crate) fn validate_coordinates(lat: f64, lon: f64) -> Result<(), WeatherError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(WeatherError::InvalidRequest(format!(
            "coordinates ({lat}, {lon}) out of range"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_are_validated() {
        assert!(validate_coordinates(0.0, 0.0).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[tokio::test]
    async fn client_from_config_without_key_fails_before_network() {
        let cfg = Config {
            // Unroutable: a request would not fail with a configuration error.
            base_url: "http://127.0.0.1:9".into(),
            ..Config::default()
        };
        if cfg.is_api_key_configured() {
            // CITYWEATHER_API_KEY is set in this environment.
            return;
        }

        let client = client_from_config(&cfg);
        let err = client.fetch_current(51.5, -0.12).await.unwrap_err();
        assert!(matches!(err, WeatherError::Configuration(_)));
    }
}
