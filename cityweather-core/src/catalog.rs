use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{config::Config, error::CatalogError};

/// A supported city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    pub country_code: String,
    pub lat: f64,
    pub lon: f64,
    pub timezone: String,
}

// id, name, country code, lat, lon, timezone
const BUILTIN: &[(&str, &str, &str, f64, f64, &str)] = &[
    ("london", "London", "GB", 51.5074, -0.1278, "Europe/London"),
    ("paris", "Paris", "FR", 48.8566, 2.3522, "Europe/Paris"),
    ("berlin", "Berlin", "DE", 52.52, 13.405, "Europe/Berlin"),
    ("madrid", "Madrid", "ES", 40.4168, -3.7038, "Europe/Madrid"),
    ("rome", "Rome", "IT", 41.9028, 12.4964, "Europe/Rome"),
    ("new-york", "New York", "US", 40.7128, -74.006, "America/New_York"),
    ("tokyo", "Tokyo", "JP", 35.6762, 139.6503, "Asia/Tokyo"),
    ("sydney", "Sydney", "AU", -33.8688, 151.2093, "Australia/Sydney"),
    ("cairo", "Cairo", "EG", 30.0444, 31.2357, "Africa/Cairo"),
    ("rio-de-janeiro", "Rio de Janeiro", "BR", -22.9068, -43.1729, "America/Sao_Paulo"),
];

/// Read-only list of cities, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    cities: Vec<City>,
}

impl Catalog {
    pub fn new(cities: Vec<City>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(cities.len());
        for city in &cities {
            if city.id.trim().is_empty() {
                return Err(CatalogError::EmptyId(city.name.clone()));
            }
            if !seen.insert(city.id.as_str()) {
                return Err(CatalogError::DuplicateId(city.id.clone()));
            }
        }

        Ok(Self { cities })
    }

    /// The cities shipped with the application.
    pub fn builtin() -> Self {
        let cities = BUILTIN
            .iter()
            .map(|&(id, name, country_code, lat, lon, timezone)| City {
                id: id.to_string(),
                name: name.to_string(),
                country_code: country_code.to_string(),
                lat,
                lon,
                timezone: timezone.to_string(),
            })
            .collect();

        Self { cities }
    }

    /// Cities from the config file when it lists any, the builtin list otherwise.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        if config.cities.is_empty() {
            Ok(Self::builtin())
        } else {
            Self::new(config.cities.clone())
        }
    }

    pub fn find(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_city(id: &str) -> City {
    City {
        id: id.to_string(),
        name: id.to_uppercase(),
        country_code: "XX".to_string(),
        lat: 10.0,
        lon: 20.0,
        timezone: "Etc/UTC".to_string(),
    }
}
