//! Display formatting. Units are applied here only; the API already returns
//! both unit systems, so switching units never needs a fetch.

use crate::{
    model::{CurrentConditions, Forecast, ForecastDay},
    prefs::{ForecastDays, Units},
};

/// Round half up (toward positive infinity), so `-2.5` becomes `-2`.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn unit_symbol(units: Units) -> &'static str {
    match units {
        Units::Celsius => "°C",
        Units::Fahrenheit => "°F",
    }
}

pub fn format_temperature(celsius: f64, fahrenheit: f64, units: Units) -> String {
    let value = match units {
        Units::Celsius => celsius,
        Units::Fahrenheit => fahrenheit,
    };
    format!("{}{}", round_half_up(value), unit_symbol(units))
}

pub fn format_wind(kph: f64, mph: f64, units: Units) -> String {
    match units {
        Units::Celsius => format!("{kph} km/h"),
        Units::Fahrenheit => format!("{mph} mph"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCurrent {
    pub temperature: String,
    pub feels_like: String,
    pub humidity: String,
    pub wind: String,
    pub condition: String,
    pub icon_url: String,
    pub local_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDay {
    pub date: String,
    pub condition: String,
    pub icon_url: String,
    pub max: String,
    pub min: String,
}

/// Every display string of a loaded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub current: RenderedCurrent,
    pub forecast_heading: String,
    pub days: Vec<RenderedDay>,
}

impl RenderedCurrent {
    pub fn new(current: &CurrentConditions, units: Units) -> Self {
        Self {
            temperature: format_temperature(current.temperature_c, current.temperature_f, units),
            feels_like: format_temperature(current.feels_like_c, current.feels_like_f, units),
            humidity: format!("{}%", current.humidity_pct),
            wind: format_wind(current.wind_kph, current.wind_mph, units),
            condition: current.condition_text.clone(),
            icon_url: current.condition_icon_url.clone(),
            local_time: current.local_time.clone(),
        }
    }

    /// `Feels like 3°C • Humidity 75% • Wind 12.5 km/h`
    pub fn summary_line(&self) -> String {
        format!(
            "Feels like {} • Humidity {} • Wind {}",
            self.feels_like, self.humidity, self.wind
        )
    }
}

impl RenderedDay {
    pub fn new(day: &ForecastDay, units: Units) -> Self {
        Self {
            date: day.date.format("%Y-%m-%d").to_string(),
            condition: day.condition_text.clone(),
            icon_url: day.condition_icon_url.clone(),
            max: format_temperature(day.max_temp_c, day.max_temp_f, units),
            min: format_temperature(day.min_temp_c, day.min_temp_f, units),
        }
    }
}

impl RenderedReport {
    pub fn new(
        current: &CurrentConditions,
        forecast: &Forecast,
        requested_days: ForecastDays,
        units: Units,
    ) -> Self {
        Self {
            current: RenderedCurrent::new(current, units),
            forecast_heading: format!(
                "Forecast for {} days ({})",
                requested_days,
                unit_symbol(units)
            ),
            days: forecast.days.iter().map(|d| RenderedDay::new(d, units)).collect(),
        }
    }
}
