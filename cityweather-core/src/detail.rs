//! The city detail view: `Idle -> Loading -> {Ready, Error}`, or `NotFound`
//! when the id is not in the catalog.
//!
//! Every fetch carries a token from a per-view counter. A result is applied
//! only when its token is still the latest one issued, so a slow response
//! for a previous city or day count can never overwrite newer state. The
//! superseded request is not aborted; its result is simply dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    catalog::{Catalog, City},
    error::WeatherError,
    format::RenderedReport,
    model::{CurrentConditions, Forecast},
    prefs::{ForecastDays, Units},
    provider::WeatherClient,
};

/// Current conditions and forecast for one city, fetched together.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: City,
    pub days: ForecastDays,
    pub current: CurrentConditions,
    pub forecast: Forecast,
}

impl WeatherReport {
    pub fn render(&self, units: Units) -> RenderedReport {
        RenderedReport::new(&self.current, &self.forecast, self.days, units)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Idle,
    NotFound { city_id: String },
    Loading,
    Ready(Box<WeatherReport>),
    Failed(WeatherError),
}

impl DetailState {
    pub fn is_loading(&self) -> bool {
        matches!(self, DetailState::Loading)
    }

    /// User-facing message for a failed load.
    pub fn error_message(&self) -> Option<String> {
        match self {
            DetailState::Failed(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

/// Both fetches for one token, not yet started.
#[derive(Debug)]
pub struct PendingFetch<C: ?Sized> {
    token: u64,
    client: Arc<C>,
    city: City,
    days: ForecastDays,
}

/// Result of a [`PendingFetch`], to be handed back to [`DetailView::apply`].
#[derive(Debug)]
pub struct FetchOutcome {
    token: u64,
    result: Result<WeatherReport, WeatherError>,
}

impl FetchOutcome {
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl<C: WeatherClient + ?Sized> PendingFetch<C> {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn city(&self) -> &City {
        &self.city
    }

    /// Issue current + forecast concurrently and wait for both.
    pub async fn run(self) -> FetchOutcome {
        let Self { token, client, city, days } = self;

        let result = tokio::try_join!(
            client.fetch_current(city.lat, city.lon),
            client.fetch_forecast(city.lat, city.lon, days),
        )
        .map(|(current, forecast)| WeatherReport { city, days, current, forecast });

        FetchOutcome { token, result }
    }
}

#[derive(Debug)]
pub struct DetailView<C: ?Sized> {
    client: Arc<C>,
    catalog: Arc<Catalog>,
    city: Option<City>,
    days: ForecastDays,
    latest_token: u64,
    torn_down: bool,
    state: DetailState,
}

impl<C: WeatherClient + ?Sized> DetailView<C> {
    pub fn new(client: Arc<C>, catalog: Arc<Catalog>) -> Self {
        Self {
            client,
            catalog,
            city: None,
            days: ForecastDays::default(),
            latest_token: 0,
            torn_down: false,
            state: DetailState::Idle,
        }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn city(&self) -> Option<&City> {
        self.city.as_ref()
    }

    pub fn days(&self) -> ForecastDays {
        self.days
    }

    /// Enter the view for `city_id`. Returns the fetch to run, or `None`
    /// when the city is unknown (no request is made in that case).
    pub fn open(&mut self, city_id: &str, days: ForecastDays) -> Option<PendingFetch<C>> {
        self.torn_down = false;
        self.days = days;
        // Anything still in flight belongs to the previous city.
        self.latest_token += 1;

        match self.catalog.find(city_id) {
            Some(city) => {
                let city = city.clone();
                self.city = Some(city.clone());
                Some(self.issue(city))
            }
            None => {
                info!(city_id, "city not in catalog");
                self.city = None;
                self.state = DetailState::NotFound { city_id: city_id.to_string() };
                None
            }
        }
    }

    /// React to a forecast-length change. Only a different value re-fetches.
    pub fn set_days(&mut self, days: ForecastDays) -> Option<PendingFetch<C>> {
        if days == self.days {
            return None;
        }
        self.days = days;
        if self.torn_down {
            return None;
        }
        let city = self.city.clone()?;
        Some(self.issue(city))
    }

    /// Re-fetch the current city with the current day count.
    pub fn refresh(&mut self) -> Option<PendingFetch<C>> {
        if self.torn_down {
            return None;
        }
        let city = self.city.clone()?;
        Some(self.issue(city))
    }

    fn issue(&mut self, city: City) -> PendingFetch<C> {
        self.latest_token += 1;
        self.state = DetailState::Loading;

        debug!(city = %city.id, days = %self.days, token = self.latest_token, "fetch issued");

        PendingFetch {
            token: self.latest_token,
            client: Arc::clone(&self.client),
            city,
            days: self.days,
        }
    }

    /// Apply a finished fetch. Returns `false` when the outcome is stale
    /// (a newer fetch was issued or the view was torn down).
    pub fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if self.torn_down || outcome.token != self.latest_token {
            debug!(token = outcome.token, latest = self.latest_token, "discarding stale result");
            return false;
        }

        self.state = match outcome.result {
            Ok(report) => DetailState::Ready(Box::new(report)),
            Err(err) => {
                warn!(error = %err, "weather load failed");
                DetailState::Failed(err)
            }
        };
        true
    }

    /// The view is gone; nothing in flight may touch it any more.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.latest_token += 1;
    }

    /// Open, fetch and apply in one go.
    pub async fn load(&mut self, city_id: &str, days: ForecastDays) -> &DetailState {
        if let Some(pending) = self.open(city_id, days) {
            let outcome = pending.run().await;
            self.apply(outcome);
        }
        &self.state
    }

    /// Display strings for the loaded report; formatting only, no fetch.
    pub fn render(&self, units: Units) -> Option<RenderedReport> {
        match &self.state {
            DetailState::Ready(report) => Some(report.render(units)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::test_city,
        model::{ForecastDay, Location},
    };
    use async_trait::async_trait;
    use chrono::{Days, NaiveDate};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct ScriptedClient {
        calls: AtomicUsize,
        current_error: Mutex<Option<WeatherError>>,
        forecast_error: Mutex<Option<WeatherError>>,
    }

    impl ScriptedClient {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherClient for ScriptedClient {
        async fn fetch_current(
            &self,
            lat: f64,
            _lon: f64,
        ) -> Result<CurrentConditions, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.current_error.lock().clone() {
                return Err(err);
            }
            Ok(CurrentConditions {
                temperature_c: lat,
                temperature_f: lat * 9.0 / 5.0 + 32.0,
                feels_like_c: lat - 1.0,
                feels_like_f: (lat - 1.0) * 9.0 / 5.0 + 32.0,
                humidity_pct: 60,
                wind_kph: 10.0,
                wind_mph: 6.2,
                condition_text: "Sunny".into(),
                condition_icon_url: "https://cdn/sunny.png".into(),
                local_time: "2024-01-15 12:00".into(),
            })
        }

        async fn fetch_forecast(
            &self,
            _lat: f64,
            _lon: f64,
            days: ForecastDays,
        ) -> Result<Forecast, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.forecast_error.lock().clone() {
                return Err(err);
            }
            let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
            let days = (0..u64::from(days.get()))
                .map(|i| ForecastDay {
                    date: start.checked_add_days(Days::new(i)).unwrap(),
                    max_temp_c: 8.0,
                    max_temp_f: 46.4,
                    min_temp_c: 2.0,
                    min_temp_f: 35.6,
                    condition_text: "Cloudy".into(),
                    condition_icon_url: String::new(),
                })
                .collect();
            Ok(Forecast {
                location: Location {
                    name: "Somewhere".into(),
                    region: String::new(),
                    country: "XX".into(),
                    local_time: "2024-01-15 12:00".into(),
                },
                days,
            })
        }
    }

    fn city_at(id: &str, lat: f64) -> City {
        City { lat, ..test_city(id) }
    }

    fn view() -> (DetailView<ScriptedClient>, Arc<ScriptedClient>) {
        let client = Arc::new(ScriptedClient::default());
        let catalog =
            Catalog::new(vec![city_at("london", 51.0), city_at("tokyo", 35.0)]).unwrap();
        (DetailView::new(Arc::clone(&client), Arc::new(catalog)), client)
    }

    fn days(n: u8) -> ForecastDays {
        ForecastDays::new(n).unwrap()
    }

    #[tokio::test]
    async fn unknown_city_is_not_found_without_network() {
        let (mut view, client) = view();

        assert!(view.open("paris", days(3)).is_none());
        assert_eq!(view.state(), &DetailState::NotFound { city_id: "paris".into() });
        assert_eq!(client.calls(), 0);
        assert!(view.refresh().is_none());
        assert!(view.set_days(days(5)).is_none());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn forecast_length_matches_requested_days() {
        let (mut view, _client) = view();

        for n in ForecastDays::MIN..=ForecastDays::MAX {
            let state = view.load("london", days(n)).await;
            let DetailState::Ready(report) = state else {
                panic!("expected ready state, got {state:?}");
            };
            assert_eq!(report.forecast.days.len(), usize::from(n));

            let rendered = view.render(Units::Celsius).unwrap();
            assert_eq!(rendered.days.len(), usize::from(n));
            assert_eq!(rendered.forecast_heading, format!("Forecast for {n} days (°C)"));
        }
    }

    #[tokio::test]
    async fn http_failure_shows_error_and_nothing_else() {
        let (mut view, client) = view();
        *client.forecast_error.lock() = Some(WeatherError::transport(500, "server error"));

        let state = view.load("tokyo", days(3)).await.clone();

        let message = state.error_message().expect("should be failed");
        assert!(message.contains("500"));
        assert!(message.contains("server error"));
        assert!(view.render(Units::Celsius).is_none());
    }

    #[tokio::test]
    async fn current_failure_also_fails_the_view() {
        let (mut view, client) = view();
        *client.current_error.lock() =
            Some(WeatherError::Connectivity("connection refused".into()));

        let state = view.load("tokyo", days(3)).await;
        assert!(matches!(state, DetailState::Failed(WeatherError::Connectivity(_))));
    }

    #[tokio::test]
    async fn stale_response_does_not_overwrite_newer_city() {
        let (mut view, _client) = view();

        let for_london = view.open("london", days(3)).unwrap();
        let for_tokyo = view.open("tokyo", days(3)).unwrap();
        assert!(view.state().is_loading());

        // Tokyo resolves first, London arrives late.
        assert!(view.apply(for_tokyo.run().await));
        assert!(!view.apply(for_london.run().await));

        let DetailState::Ready(report) = view.state() else {
            panic!("expected ready state");
        };
        assert_eq!(report.city.id, "tokyo");
        assert_eq!(report.current.temperature_c, 35.0);
    }

    #[tokio::test]
    async fn superseded_fetch_is_ignored_even_if_it_arrives_first() {
        let (mut view, _client) = view();

        let three = view.open("london", days(3)).unwrap();
        let five = view.set_days(days(5)).unwrap();

        assert!(!view.apply(three.run().await));
        assert!(view.state().is_loading());
        assert!(view.apply(five.run().await));
        assert_eq!(view.render(Units::Celsius).unwrap().days.len(), 5);
    }

    #[tokio::test]
    async fn unit_toggle_rerenders_without_fetching() {
        let (mut view, client) = view();
        view.load("london", days(2)).await;
        let calls = client.calls();

        let celsius = view.render(Units::Celsius).unwrap();
        let fahrenheit = view.render(Units::Fahrenheit).unwrap();
        assert_eq!(client.calls(), calls);

        assert!(celsius.current.temperature.ends_with("°C"));
        assert!(celsius.current.feels_like.ends_with("°C"));
        assert!(celsius.current.wind.ends_with("km/h"));
        assert!(fahrenheit.current.temperature.ends_with("°F"));
        assert!(fahrenheit.current.feels_like.ends_with("°F"));
        assert!(fahrenheit.current.wind.ends_with("mph"));
        for day in &fahrenheit.days {
            assert!(day.max.ends_with("°F") && day.min.ends_with("°F"));
        }
    }

    #[tokio::test]
    async fn same_day_count_does_not_refetch() {
        let (mut view, client) = view();
        view.load("london", days(3)).await;
        let calls = client.calls();

        assert!(view.set_days(days(3)).is_none());
        assert_eq!(client.calls(), calls);
        assert!(matches!(view.state(), DetailState::Ready(_)));
    }

    #[tokio::test]
    async fn torn_down_view_ignores_late_results() {
        let (mut view, _client) = view();
        let pending = view.open("london", days(3)).unwrap();

        view.teardown();
        assert!(!view.apply(pending.run().await));
        assert!(view.state().is_loading());
        assert!(view.refresh().is_none());
    }

    #[tokio::test]
    async fn both_requests_are_issued_per_load() {
        let (mut view, client) = view();
        view.load("london", days(3)).await;
        assert_eq!(client.calls(), 2);

        let pending = view.refresh().unwrap();
        assert_eq!(pending.city().id, "london");
        view.apply(pending.run().await);
        assert_eq!(client.calls(), 4);
    }
}
