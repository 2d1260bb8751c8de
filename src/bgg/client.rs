//! BGG HTTP Client
//!
//! HTTP client wrapper for the BoardGameGeek XML API 2. Every request goes
//! through the fetch pipeline: the shared rate limiter decides admission, the
//! retry policy decides what to do with each failed network attempt.

use crate::bgg::parser;
use crate::bgg::rate_limiter::RateLimiter;
use crate::bgg::retry::{RetryDecision, RetryPolicy};
use crate::bgg::types::Game;
use crate::config::{BggConfig, SecretString};
use crate::error::{CatalogError, FailureReason, FetchError, FetchFailure};
use governor::Jitter;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

/// BGG XML API client
///
/// Cloning is cheap and clones share the same rate limiter, so a single
/// client can be handed to concurrent tasks without exceeding the budget.
#[derive(Clone)]
pub struct BggClient {
    /// HTTP client for making requests
    pub(crate) client: Client,
    /// API root, without trailing slash
    pub(crate) base_url: String,
    /// Optional bearer token
    pub(crate) api_token: Option<SecretString>,
    /// Admission gate shared by every clone
    pub(crate) rate_limiter: Arc<RateLimiter>,
    pub(crate) retry: RetryPolicy,
}

impl std::fmt::Debug for BggClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BggClient")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(SecretString::masked))
            .field("rate_limit_interval", &self.rate_limiter.interval())
            .field("retry", &self.retry)
            .finish()
    }
}

impl BggClient {
    /// Creates a client from configuration with its own rate limiter
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built (TLS
    /// backend initialization).
    pub fn new(config: &BggConfig) -> Result<Self, FetchError> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_interval));
        Self::with_rate_limiter(config, limiter)
    }

    /// Creates a client that shares an existing rate limiter
    pub fn with_rate_limiter(
        config: &BggConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            rate_limiter,
            retry: config.retry,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Send a GET request through the fetch pipeline
    ///
    /// Returns the response body of the first successful attempt. Waiting
    /// for a rate-limit token does not count as an attempt; rejections have
    /// their own budget in the retry policy.
    ///
    /// # Errors
    /// * `FetchFailure` with `FailureReason::Terminal` for a non-429 4xx
    /// * `FetchFailure` with `FailureReason::AttemptsExhausted` once every
    ///   allowed attempt ended in a retryable outcome, or the limiter kept
    ///   rejecting past the rejection budget
    pub async fn send(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<String, FetchFailure> {
        let url = self.endpoint(endpoint);
        let mut attempt: u32 = 1;

        loop {
            if let Err(last) = self.admit(&url).await {
                warn!(url = %url, attempt, "Rate limiter kept rejecting, giving up");
                return Err(FetchFailure {
                    url,
                    attempts: attempt - 1,
                    reason: FailureReason::AttemptsExhausted,
                    last,
                });
            }

            let err = match self.request(&url, query).await {
                Ok(body) => {
                    debug!(url = %url, attempt, bytes = body.len(), "BGG request succeeded");
                    return Ok(body);
                }
                Err(err) => err,
            };

            match self.retry.decide(&err, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retry {} after {}ms",
                        attempt,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => {
                    let reason = if err.is_retryable() {
                        FailureReason::AttemptsExhausted
                    } else {
                        FailureReason::Terminal
                    };
                    warn!(
                        url = %url,
                        attempts = attempt,
                        reason = ?reason,
                        error_type = err.error_type(),
                        "BGG request failed"
                    );
                    return Err(FetchFailure {
                        url,
                        attempts: attempt,
                        reason,
                        last: err,
                    });
                }
            }
        }
    }

    /// Wait until the limiter admits one request
    ///
    /// Each rejection sleeps for the limiter's hint plus jitter, so callers
    /// rejected together do not wake together.
    async fn admit(&self, url: &str) -> Result<(), FetchError> {
        let mut rejections: u32 = 0;

        loop {
            let rejection = match self.rate_limiter.acquire() {
                Ok(()) => return Ok(()),
                Err(rejection) => rejection,
            };
            rejections += 1;

            if !self.retry.may_wait_again(rejections) {
                return Err(FetchError::RateLimited {
                    retry_after: rejection.retry_after,
                });
            }

            let jitter = Jitter::up_to(self.rate_limiter.interval() / 2);
            let delay = jitter + self.retry.rejection_delay(rejection.retry_after);
            debug!(
                url = %url,
                rejections,
                delay_ms = delay.as_millis() as u64,
                "Waiting for a rate limit token"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One network call, classified
    async fn request(&self, url: &str, query: &[(&str, String)]) -> Result<String, FetchError> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    /// Fetch the raw `thing` payload for a group of ids, stats included
    pub async fn fetch_thing_xml(&self, ids: &[u32]) -> Result<String, FetchFailure> {
        let joined = ids
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.send("thing", &[("id", joined), ("stats", "1".to_string())])
            .await
    }

    /// Fetch the raw `collection` payload of owned base games for a user
    pub async fn fetch_collection_xml(&self, username: &str) -> Result<String, FetchFailure> {
        self.send(
            "collection",
            &[
                ("username", username.to_string()),
                ("own", "1".to_string()),
                ("subtype", "boardgame".to_string()),
                ("excludesubtype", "boardgameexpansion".to_string()),
            ],
        )
        .await
    }

    /// Fetch and parse a single game
    pub async fn fetch_game(&self, id: u32) -> Result<Game, CatalogError> {
        let xml = self.fetch_thing_xml(&[id]).await?;
        Ok(parser::parse_game(&xml)?)
    }
}
