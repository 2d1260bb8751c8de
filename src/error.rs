use std::time::Duration;

use thiserror::Error;

/// Classified outcome of a single request attempt that did not succeed.
///
/// Each variant maps to one row of the retry table: everything except
/// `RemoteClientError` is worth another attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Rate limited locally, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("BGG server error (HTTP {status})")]
    RemoteServerError { status: u16 },

    #[error("BGG throttled the request (HTTP 429)")]
    RemoteThrottled,

    #[error("BGG rejected the request (HTTP {status})")]
    RemoteClientError { status: u16 },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::RemoteClientError { .. })
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "transport_failure",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::RemoteServerError { .. } => "remote_server_error",
            FetchError::RemoteThrottled => "remote_throttled",
            FetchError::RemoteClientError { .. } => "remote_client_error",
        }
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FetchError::RemoteThrottled,
            500..=599 => FetchError::RemoteServerError { status },
            _ => FetchError::RemoteClientError { status },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Transport("request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Transport("failed to connect to BGG".to_string())
        } else if let Some(status) = err.status() {
            FetchError::from_status(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Why the fetch pipeline stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The last outcome is never retried (non-429 4xx).
    Terminal,
    /// Every allowed attempt ended in a retryable outcome.
    AttemptsExhausted,
}

/// Terminal failure of the fetch pipeline for one request.
#[derive(Error, Debug, Clone)]
#[error("request to {url} failed after {attempts} attempt(s): {last}")]
pub struct FetchFailure {
    pub url: String,
    /// Network attempts made; waits for a rate-limit token are not counted
    pub attempts: u32,
    pub reason: FailureReason,
    #[source]
    pub last: FetchError,
}

/// Structural problems in a BGG XML payload.
///
/// Missing optional fields never produce one of these; only a payload
/// without the expected root does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Empty document")]
    EmptyDocument,

    #[error("No <item> element in response")]
    MissingItem,

    #[error("BGG returned an error: {0}")]
    Remote(String),

    #[error("Unexpected BGG message: {0}")]
    UnexpectedMessage(String),
}

impl From<quick_xml::de::DeError> for ParseError {
    fn from(err: quick_xml::de::DeError) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

/// Error surfaced by the catalog operations (details, collections, merge).
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    #[error("Game data unavailable: {0}")]
    Fetch(#[from] FetchFailure),

    #[error("Collection for '{username}' still processing at BGG after {attempts} polls")]
    CollectionTimeout { username: String, attempts: u32 },

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Merge cancelled while collections were being fetched")]
    Cancelled,
}

impl CatalogError {
    pub fn error_type(&self) -> &'static str {
        match self {
            CatalogError::Fetch(failure) => failure.last.error_type(),
            CatalogError::CollectionTimeout { .. } => "collection_timeout",
            CatalogError::Parse(_) => "parse_failure",
            CatalogError::Cancelled => "cancelled",
        }
    }

    /// True when the caller should tell the user to come back later rather
    /// than report the data as unavailable.
    pub fn is_still_processing(&self) -> bool {
        matches!(self, CatalogError::CollectionTimeout { .. })
    }
}

/// Invalid configuration value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
