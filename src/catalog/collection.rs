//! Collection poller
//!
//! BGG materializes collections asynchronously: the first request for a
//! user often answers "accepted, try again later". The poller re-requests on
//! a fixed interval until the items arrive or the poll budget runs out.

use crate::bgg::{parser, BggClient, CollectionItem, CollectionResponse};
use crate::error::CatalogError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polls before reporting a collection as still processing
pub const DEFAULT_MAX_POLLS: u32 = 5;

/// Wait between polls of a deferred collection
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll state; `attempt` counts requests made so far (1-based)
#[derive(Debug)]
enum PollState {
    Requesting { attempt: u32 },
    Deferred { attempt: u32 },
    Ready(Vec<CollectionItem>),
    Failed(CatalogError),
}

/// Fetches a user's owned-game list, waiting out deferred processing
#[derive(Debug, Clone)]
pub struct CollectionPoller {
    client: BggClient,
    max_polls: u32,
    poll_interval: Duration,
}

impl CollectionPoller {
    /// Create a poller; a zero poll budget is treated as one
    pub fn new(client: BggClient, max_polls: u32, poll_interval: Duration) -> Self {
        Self {
            client,
            max_polls: max_polls.max(1),
            poll_interval,
        }
    }

    /// Fetch the owned base games of `username`
    ///
    /// # Errors
    /// * `CatalogError::CollectionTimeout` if BGG is still preparing the
    ///   collection after the last allowed poll
    /// * `CatalogError::Fetch` / `CatalogError::Parse` if a poll fails outright
    pub async fn fetch_collection(&self, username: &str) -> Result<Vec<CollectionItem>, CatalogError> {
        let mut state = PollState::Requesting { attempt: 1 };

        loop {
            state = match state {
                PollState::Requesting { attempt } => self.request(username, attempt).await,
                PollState::Deferred { attempt } if attempt >= self.max_polls => {
                    warn!(username, attempts = attempt, "Collection still processing, giving up");
                    return Err(CatalogError::CollectionTimeout {
                        username: username.to_string(),
                        attempts: attempt,
                    });
                }
                PollState::Deferred { attempt } => {
                    info!(
                        username,
                        attempt,
                        delay_ms = self.poll_interval.as_millis() as u64,
                        "Collection deferred by BGG, polling again"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                    PollState::Requesting {
                        attempt: attempt + 1,
                    }
                }
                PollState::Ready(items) => {
                    debug!(username, items = items.len(), "Collection ready");
                    return Ok(items);
                }
                PollState::Failed(error) => return Err(error),
            };
        }
    }

    async fn request(&self, username: &str, attempt: u32) -> PollState {
        let xml = match self.client.fetch_collection_xml(username).await {
            Ok(xml) => xml,
            Err(failure) => return PollState::Failed(failure.into()),
        };

        match parser::parse_collection(&xml) {
            Ok(CollectionResponse::Ready(items)) => PollState::Ready(items),
            Ok(CollectionResponse::Deferred) => PollState::Deferred { attempt },
            Err(error) => PollState::Failed(error.into()),
        }
    }
}
