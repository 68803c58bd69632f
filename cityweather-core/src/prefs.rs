//! Display preferences and their persistence.
//!
//! Every preference is stored under its own key as plain text. Reads are
//! forgiving: anything absent or outside the declared domain comes back as
//! the documented default. Strict parsing via [`FromStr`] is reserved for
//! user input.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{ParsePreferenceError, StorageError},
    storage::KeyValueStore,
};

/// Persistence keys, one per preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceKey {
    Theme,
    Units,
    ForecastDays,
}

impl PreferenceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKey::Theme => "app:theme",
            PreferenceKey::Units => "weather:units",
            PreferenceKey::ForecastDays => "weather:days",
        }
    }

    pub const fn all() -> &'static [PreferenceKey] {
        &[PreferenceKey::Theme, PreferenceKey::Units, PreferenceKey::ForecastDays]
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for PreferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that can live in the preference store.
pub trait Preference: Copy + Default + PartialEq + fmt::Debug {
    const KEY: PreferenceKey;

    /// Lenient decode of a stored value; `None` means "use the default".
    fn from_stored(raw: &str) -> Option<Self>;

    fn to_stored(self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub const fn all() -> &'static [Theme] {
        &[Theme::Light, Theme::Dark, Theme::System]
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            _ => Err(ParsePreferenceError {
                name: "theme",
                value: s.to_string(),
                expected: "light, dark or system",
            }),
        }
    }
}

impl Preference for Theme {
    const KEY: PreferenceKey = PreferenceKey::Theme;

    fn from_stored(raw: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str() == raw)
    }

    fn to_stored(self) -> String {
        self.as_str().to_string()
    }
}

/// Temperature/wind unit system used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    #[serde(rename = "c")]
    Celsius,
    #[serde(rename = "f")]
    Fahrenheit,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Celsius => "c",
            Units::Fahrenheit => "f",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Units::Celsius => Units::Fahrenheit,
            Units::Fahrenheit => Units::Celsius,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Units::Celsius => "°C (Celsius)",
            Units::Fahrenheit => "°F (Fahrenheit)",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "celsius" => Ok(Units::Celsius),
            "f" | "fahrenheit" => Ok(Units::Fahrenheit),
            _ => Err(ParsePreferenceError {
                name: "units",
                value: s.to_string(),
                expected: "c or f",
            }),
        }
    }
}

impl Preference for Units {
    const KEY: PreferenceKey = PreferenceKey::Units;

    fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "c" => Some(Units::Celsius),
            "f" => Some(Units::Fahrenheit),
            _ => None,
        }
    }

    fn to_stored(self) -> String {
        self.as_str().to_string()
    }
}

/// Number of forecast days, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ForecastDays(u8);

impl ForecastDays {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 7;
    pub const DEFAULT: u8 = 3;

    pub fn new(days: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&days).then_some(Self(days))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ForecastDays {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for ForecastDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for ForecastDays {
    type Error = ParsePreferenceError;

    fn try_from(days: u8) -> Result<Self, Self::Error> {
        Self::new(days).ok_or_else(|| days_error(&days.to_string()))
    }
}

impl From<ForecastDays> for u8 {
    fn from(days: ForecastDays) -> Self {
        days.0
    }
}

impl FromStr for ForecastDays {
    type Err = ParsePreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| days_error(s))
    }
}

fn days_error(value: &str) -> ParsePreferenceError {
    ParsePreferenceError {
        name: "forecast days",
        value: value.to_string(),
        expected: "a whole number from 1 to 7",
    }
}

impl Preference for ForecastDays {
    const KEY: PreferenceKey = PreferenceKey::ForecastDays;

    // Numeric decode: "5", " 5 " and "5.0" are accepted; "2.5", "NaN",
    // "inf" and anything outside 1..=7 are not.
    fn from_stored(raw: &str) -> Option<Self> {
        let n: f64 = raw.trim().parse().ok()?;
        if !n.is_finite() || n.fract() != 0.0 {
            return None;
        }
        if n < f64::from(Self::MIN) || n > f64::from(Self::MAX) {
            return None;
        }
        Self::new(n as u8)
    }

    fn to_stored(self) -> String {
        self.0.to_string()
    }
}

/// The full set of display preferences as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub units: Units,
    pub days: ForecastDays,
}

/// Typed, validated access to preferences on top of a [`KeyValueStore`].
#[derive(Debug)]
pub struct PreferenceStore<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for PreferenceStore<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<S: KeyValueStore + ?Sized> PreferenceStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &Arc<S> {
        &self.store
    }

    /// Read a preference. Never fails: absent, malformed or unreadable
    /// values yield the default.
    pub fn get<P: Preference>(&self) -> P {
        let key = P::KEY.as_str();
        match self.store.get(key) {
            Ok(None) => P::default(),
            Ok(Some(raw)) => P::from_stored(&raw).unwrap_or_else(|| {
                warn!(key, raw = %raw, "stored preference out of domain, using default");
                P::default()
            }),
            Err(err) => {
                warn!(key, error = %err, "failed to read preference, using default");
                P::default()
            }
        }
    }

    /// Write a preference through to storage immediately.
    pub fn set<P: Preference>(&self, value: P) -> Result<(), StorageError> {
        let key = P::KEY.as_str();
        self.store.set(key, &value.to_stored())?;
        info!(key, value = ?value, "preference saved");
        Ok(())
    }

    pub fn load(&self) -> Preferences {
        Preferences {
            theme: self.get(),
            units: self.get(),
            days: self.get(),
        }
    }

    /// Re-read a single key into `prefs`. Returns whether the value changed.
    pub fn reload_key(&self, key: PreferenceKey, prefs: &mut Preferences) -> bool {
        let before = *prefs;
        match key {
            PreferenceKey::Theme => prefs.theme = self.get(),
            PreferenceKey::Units => prefs.units = self.get(),
            PreferenceKey::ForecastDays => prefs.days = self.get(),
        }
        before != *prefs
    }
}
