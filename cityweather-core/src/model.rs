use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Current conditions for one location, in both unit systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub temperature_f: f64,
    pub feels_like_c: f64,
    pub feels_like_f: f64,
    pub humidity_pct: u8,
    pub wind_kph: f64,
    pub wind_mph: f64,
    pub condition_text: String,
    pub condition_icon_url: String,
    pub local_time: String,
}

/// One day of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub max_temp_c: f64,
    pub max_temp_f: f64,
    pub min_temp_c: f64,
    pub min_temp_f: f64,
    pub condition_text: String,
    pub condition_icon_url: String,
}

/// Location block echoed back by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub region: String,
    pub country: String,
    pub local_time: String,
}

/// A forecast: chronological days, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: Location,
    pub days: Vec<ForecastDay>,
}
