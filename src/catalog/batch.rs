//! Batch game detail fetcher
//!
//! Splits an id list into chunks small enough for one `thing` request each,
//! and keeps going when a single chunk fails.

use crate::bgg::{parser, BggClient, Game};
use crate::error::CatalogError;
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maximum ids BGG serves in one `thing` request
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// A chunk whose request terminally failed; its ids are absent from the output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub ids: Vec<u32>,
    #[serde(serialize_with = "serialize_error")]
    pub error: CatalogError,
}

/// Result of a batch detail fetch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Games from every successful chunk, in chunk order
    pub games: Vec<Game>,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Ids never requested because the fetch was cancelled
    pub unfetched_ids: Vec<u32>,
    /// False when cancellation stopped the loop early
    pub complete: bool,
}

impl Default for BatchOutcome {
    fn default() -> Self {
        Self {
            games: Vec::new(),
            failed_chunks: Vec::new(),
            unfetched_ids: Vec::new(),
            complete: true,
        }
    }
}

impl BatchOutcome {
    /// Ids belonging to chunks that failed
    pub fn failed_ids(&self) -> Vec<u32> {
        self.failed_chunks
            .iter()
            .flat_map(|chunk| chunk.ids.iter().copied())
            .collect()
    }

    /// True when every requested chunk succeeded
    pub fn is_full_success(&self) -> bool {
        self.complete && self.failed_chunks.is_empty()
    }
}

pub(crate) fn serialize_error<S>(error: &CatalogError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&error.to_string())
}

/// Fetches full game records for arbitrary id lists
#[derive(Debug, Clone)]
pub struct GameFetcher {
    client: BggClient,
    chunk_size: usize,
}

impl GameFetcher {
    /// Create a fetcher; a zero chunk size is treated as one
    pub fn new(client: BggClient, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fetch details for `ids`, one request per chunk
    pub async fn fetch_details(&self, ids: &[u32]) -> BatchOutcome {
        self.fetch_details_until(ids, &CancellationToken::new()).await
    }

    /// Fetch details for `ids`, stopping early when `cancel` fires
    ///
    /// On cancellation the games gathered so far are returned, the remaining
    /// ids are listed in `unfetched_ids` and `complete` is false.
    pub async fn fetch_details_until(
        &self,
        ids: &[u32],
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let chunks: Vec<&[u32]> = ids.chunks(self.chunk_size).collect();
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.fetch_chunk(chunk) => Some(result),
            };

            let Some(result) = result else {
                outcome.complete = false;
                outcome.unfetched_ids = chunks[index..].concat();
                info!(
                    chunk = index + 1,
                    total,
                    unfetched = outcome.unfetched_ids.len(),
                    "Detail fetch cancelled"
                );
                break;
            };

            match result {
                Ok(games) => {
                    debug!(chunk = index + 1, total, games = games.len(), "Fetched detail chunk");
                    outcome.games.extend(games);
                }
                Err(error) => {
                    warn!(
                        chunk = index + 1,
                        total,
                        ids = ?chunk,
                        error = %error,
                        "Detail chunk failed, continuing"
                    );
                    outcome.failed_chunks.push(ChunkFailure {
                        ids: chunk.to_vec(),
                        error,
                    });
                }
            }
        }

        outcome
    }

    async fn fetch_chunk(&self, chunk: &[u32]) -> Result<Vec<Game>, CatalogError> {
        let xml = self.client.fetch_thing_xml(chunk).await?;
        Ok(parser::parse_games(&xml)?)
    }
}
