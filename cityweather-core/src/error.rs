use thiserror::Error;

const MAX_BODY_CHARS: usize = 200;

/// Failures surfaced by a [`WeatherClient`](crate::provider::WeatherClient).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    /// No API credential is available; no request was issued.
    #[error("{0}")]
    Configuration(String),

    /// The API answered with a non-success status.
    #[error("WeatherAPI {status}: {body}")]
    Transport { status: u16, body: String },

    /// No response was received at all.
    #[error("Could not reach WeatherAPI: {0}")]
    Connectivity(String),

    /// The response body did not have the expected shape.
    #[error("Unexpected WeatherAPI response: {0}")]
    Decode(String),

    /// The caller violated a precondition (e.g. coordinates out of range).
    #[error("Invalid weather request: {0}")]
    InvalidRequest(String),
}

impl WeatherError {
    pub fn missing_api_key() -> Self {
        WeatherError::Configuration(
            "WeatherAPI key is missing.\n\
             Hint: run `cityweather configure` or set CITYWEATHER_API_KEY."
                .to_string(),
        )
    }

    pub fn transport(status: u16, body: &str) -> Self {
        WeatherError::Transport { status, body: truncate_body(body) }
    }
}

/// Failures of the persistent key/value store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage file {path} is malformed: {message}")]
    Format { path: String, message: String },
}

/// Rejected city catalog definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("duplicate city id '{0}' in catalog")]
    DuplicateId(String),

    #[error("city '{0}' has an empty id")]
    EmptyId(String),
}

/// Strict parse failure for a preference value typed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {name} '{value}': expected {expected}")]
pub struct ParsePreferenceError {
    pub name: &'static str,
    pub value: String,
    pub expected: &'static str,
}

fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
