//! BGG client configuration
//!
//! Everything the engine needs to talk to the XML API: transport settings,
//! rate limit, retry and polling budgets, and merge behaviour.

use crate::bgg::retry::RetryPolicy;
use crate::catalog::merge::UserFailurePolicy;
use crate::config::credentials::SecretString;
use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Public XML API 2 root
pub const DEFAULT_BASE_URL: &str = "https://boardgamegeek.com/xmlapi2";

/// Client identifier sent as `User-Agent`
pub const DEFAULT_USER_AGENT: &str = "BggGameNightPlanner";

/// BGG client configuration
///
/// ## Environment Variables
///
/// - `BGG_BASE_URL`: API root (default: https://boardgamegeek.com/xmlapi2)
/// - `BGG_USER_AGENT`: descriptive client identifier (default: BggGameNightPlanner)
/// - `BGG_API_TOKEN`: bearer token attached to every request (optional)
/// - `BGG_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
/// - `BGG_RATE_LIMIT_INTERVAL_MS`: one request admitted per interval (default: 1000)
/// - `BGG_MAX_ATTEMPTS`: attempts per request including the first (default: 3)
/// - `BGG_RETRY_BASE_DELAY_MS`: linear backoff unit (default: 5000)
/// - `BGG_RATE_LIMIT_FALLBACK_MS`: wait after a local rejection without hint (default: 2000)
/// - `BGG_MAX_RATE_LIMIT_WAITS`: local rejections tolerated per request (default: 10)
/// - `BGG_COLLECTION_MAX_POLLS`: polls before giving up on a deferred collection (default: 5)
/// - `BGG_COLLECTION_POLL_INTERVAL_MS`: wait between collection polls (default: 2000)
/// - `BGG_DETAIL_CHUNK_SIZE`: ids per `thing` request (default: 20)
/// - `BGG_USER_CONCURRENCY`: collections fetched in parallel (default: 2)
/// - `BGG_USER_FAILURE_POLICY`: `abort` or `skip` (default: abort)
#[derive(Debug, Clone)]
pub struct BggConfig {
    pub base_url: String,
    pub user_agent: String,
    pub api_token: Option<SecretString>,
    pub request_timeout: Duration,
    pub rate_limit_interval: Duration,
    pub retry: RetryPolicy,
    pub collection_max_polls: u32,
    pub collection_poll_interval: Duration,
    pub detail_chunk_size: usize,
    pub user_concurrency: usize,
    pub user_failure_policy: UserFailurePolicy,
}

impl Default for BggConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(30),
            rate_limit_interval: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
            collection_max_polls: 5,
            collection_poll_interval: Duration::from_millis(2000),
            detail_chunk_size: 20,
            user_concurrency: 2,
            user_failure_policy: UserFailurePolicy::Abort,
        }
    }
}

impl BggConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set to a value that does not parse or
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("BGG_BASE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.base_url);

        let user_agent = lookup("BGG_USER_AGENT")
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .unwrap_or(defaults.user_agent);

        let api_token = lookup("BGG_API_TOKEN")
            .as_deref()
            .and_then(SecretString::from_config_value);

        let request_timeout = Duration::from_secs(parse_positive(
            &lookup,
            "BGG_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?);
        let rate_limit_interval = millis(
            &lookup,
            "BGG_RATE_LIMIT_INTERVAL_MS",
            defaults.rate_limit_interval,
        )?;

        let retry = RetryPolicy {
            max_attempts: parse_positive(&lookup, "BGG_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            base_delay: millis(&lookup, "BGG_RETRY_BASE_DELAY_MS", defaults.retry.base_delay)?,
            rejection_fallback: millis(
                &lookup,
                "BGG_RATE_LIMIT_FALLBACK_MS",
                defaults.retry.rejection_fallback,
            )?,
            max_rejections: parse_positive(
                &lookup,
                "BGG_MAX_RATE_LIMIT_WAITS",
                defaults.retry.max_rejections,
            )?,
        };

        let collection_max_polls = parse_positive(
            &lookup,
            "BGG_COLLECTION_MAX_POLLS",
            defaults.collection_max_polls,
        )?;
        let collection_poll_interval = millis(
            &lookup,
            "BGG_COLLECTION_POLL_INTERVAL_MS",
            defaults.collection_poll_interval,
        )?;
        let detail_chunk_size =
            parse_positive(&lookup, "BGG_DETAIL_CHUNK_SIZE", defaults.detail_chunk_size)?;
        let user_concurrency =
            parse_positive(&lookup, "BGG_USER_CONCURRENCY", defaults.user_concurrency)?;

        let user_failure_policy = match lookup("BGG_USER_FAILURE_POLICY") {
            Some(raw) => UserFailurePolicy::from_str(raw.trim()).map_err(|reason| {
                ConfigError::Invalid {
                    var: "BGG_USER_FAILURE_POLICY",
                    value: raw.clone(),
                    reason,
                }
            })?,
            None => defaults.user_failure_policy,
        };

        Ok(Self {
            base_url,
            user_agent,
            api_token,
            request_timeout,
            rate_limit_interval,
            retry,
            collection_max_polls,
            collection_poll_interval,
            detail_chunk_size,
            user_concurrency,
            user_failure_policy,
        })
    }
}

fn parse_positive<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn millis<F>(lookup: &F, var: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_positive(lookup, var, default_ms).map(Duration::from_millis)
}
