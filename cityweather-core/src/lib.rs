//! Core library for the `cityweather` CLI.
//!
//! This crate defines:
//! - The static city catalog
//! - A WeatherAPI.com client for current conditions and forecasts
//! - Display preferences, their persistence and cross-process synchronization
//! - Theme resolution against the host's ambient color scheme
//! - The city detail view state machine and display formatting
//!
//! It is used by `cityweather-cli`, but can also be reused by other front ends.

pub mod catalog;
pub mod config;
pub mod detail;
pub mod error;
pub mod format;
pub mod model;
pub mod prefs;
pub mod provider;
pub mod storage;
pub mod sync;
pub mod theme;

pub use catalog::{Catalog, City};
pub use config::Config;
pub use detail::{DetailState, DetailView, FetchOutcome, PendingFetch, WeatherReport};
pub use error::{CatalogError, ParsePreferenceError, StorageError, WeatherError};
pub use format::RenderedReport;
pub use model::{CurrentConditions, Forecast, ForecastDay, Location};
pub use prefs::{ForecastDays, PreferenceKey, PreferenceStore, Preferences, Theme, Units};
pub use provider::{WeatherClient, client_from_config};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageEvent, StorageEvents};
pub use sync::{SettingsSync, Visibility};
pub use theme::{
    AmbientColorScheme, ColorScheme, DarkFlag, Subscription, ThemeController, ThemeSink,
};
