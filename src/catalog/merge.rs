//! Merge engine
//!
//! Combines several users' collections into one list of games, each carrying
//! the set of usernames that own it.
//!
//! Per-user collection fetches run concurrently, but the ownership map has a
//! single writer: results are drained from one stream and applied in turn.

use crate::bgg::{BggClient, CollectionItem, Game};
use crate::catalog::batch::{serialize_error, ChunkFailure, GameFetcher};
use crate::catalog::collection::CollectionPoller;
use crate::config::BggConfig;
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What to do when one user's collection cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserFailurePolicy {
    /// Fail the whole merge
    #[default]
    Abort,
    /// Leave the user out and report them in `skipped_users`
    Skip,
}

impl FromStr for UserFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(UserFailurePolicy::Abort),
            "skip" => Ok(UserFailurePolicy::Skip),
            other => Err(format!("expected 'abort' or 'skip', got '{}'", other)),
        }
    }
}

/// Game id → usernames owning it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipMap {
    owners: BTreeMap<u32, BTreeSet<String>>,
}

impl OwnershipMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `username` as an owner of every item; repeats are no-ops
    pub fn record(&mut self, username: &str, items: &[CollectionItem]) {
        for item in items {
            self.owners
                .entry(item.game_id)
                .or_default()
                .insert(username.to_string());
        }
    }

    /// Distinct game ids, ascending
    pub fn game_ids(&self) -> Vec<u32> {
        self.owners.keys().copied().collect()
    }

    pub fn owners_of(&self, game_id: u32) -> Option<&BTreeSet<String>> {
        self.owners.get(&game_id)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Attach owner sets to fetched games
    ///
    /// Games missing from the map keep an empty owner set.
    pub fn annotate(&self, games: Vec<Game>) -> Vec<Game> {
        games
            .into_iter()
            .map(|mut game| {
                match self.owners_of(game.game_id) {
                    Some(owners) => game.owners = owners.clone(),
                    None => {
                        debug!(game_id = game.game_id, "Game not in any collection");
                        game.owners.clear();
                    }
                }
                game
            })
            .collect()
    }
}

/// A user left out of the merge under [`UserFailurePolicy::Skip`]
#[derive(Debug, Clone, Serialize)]
pub struct SkippedUser {
    pub username: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: CatalogError,
}

/// Ownership-annotated catalog for a group of users
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCatalog {
    pub games: Vec<Game>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub skipped_users: Vec<SkippedUser>,
    pub unfetched_ids: Vec<u32>,
    /// False when the detail fetch was cancelled
    pub complete: bool,
    pub generated_at: DateTime<Utc>,
}

impl MergedCatalog {
    /// Owner sets keyed by game id
    pub fn ownership(&self) -> BTreeMap<u32, BTreeSet<String>> {
        self.games
            .iter()
            .map(|game| (game.game_id, game.owners.clone()))
            .collect()
    }
}

/// Builds merged catalogs from BGG collections and game details
#[derive(Debug, Clone)]
pub struct MergeEngine {
    poller: CollectionPoller,
    fetcher: GameFetcher,
    policy: UserFailurePolicy,
    user_concurrency: usize,
}

impl MergeEngine {
    /// Create an engine whose poller and fetcher share `client`
    pub fn new(client: BggClient, config: &BggConfig) -> Self {
        Self::from_parts(
            CollectionPoller::new(
                client.clone(),
                config.collection_max_polls,
                config.collection_poll_interval,
            ),
            GameFetcher::new(client, config.detail_chunk_size),
            config.user_failure_policy,
            config.user_concurrency,
        )
    }

    pub fn from_parts(
        poller: CollectionPoller,
        fetcher: GameFetcher,
        policy: UserFailurePolicy,
        user_concurrency: usize,
    ) -> Self {
        Self {
            poller,
            fetcher,
            policy,
            user_concurrency: user_concurrency.max(1),
        }
    }

    /// Merge the collections of `usernames` into one annotated game list
    pub async fn merge_collections<S>(&self, usernames: &[S]) -> Result<MergedCatalog, CatalogError>
    where
        S: AsRef<str>,
    {
        self.merge_collections_until(usernames, &CancellationToken::new())
            .await
    }

    /// Merge collections, stopping early when `cancel` fires
    ///
    /// Cancellation during the detail fetch returns the games gathered so
    /// far with `complete` set to false.
    ///
    /// # Errors
    /// * Under [`UserFailurePolicy::Abort`], the first user whose collection
    ///   cannot be fetched fails the whole merge with that user's error.
    /// * `CatalogError::Cancelled` if `cancel` fires before every collection
    ///   has been fetched.
    pub async fn merge_collections_until<S>(
        &self,
        usernames: &[S],
        cancel: &CancellationToken,
    ) -> Result<MergedCatalog, CatalogError>
    where
        S: AsRef<str>,
    {
        let usernames = distinct_usernames(usernames);
        info!(users = usernames.len(), "Merging collections");

        let (ownership, skipped_users) = self.collect_ownership(usernames, cancel).await?;

        if ownership.is_empty() {
            info!("No owned games in any collection");
        }
        let ids = ownership.game_ids();
        let batch = self.fetcher.fetch_details_until(&ids, cancel).await;
        let games = ownership.annotate(batch.games);

        info!(
            games = games.len(),
            failed_chunks = batch.failed_chunks.len(),
            skipped_users = skipped_users.len(),
            complete = batch.complete,
            "Merge finished"
        );

        Ok(MergedCatalog {
            games,
            failed_chunks: batch.failed_chunks,
            skipped_users,
            unfetched_ids: batch.unfetched_ids,
            complete: batch.complete,
            generated_at: Utc::now(),
        })
    }

    /// A single user's collection with full game details
    pub async fn fetch_collection_with_details(
        &self,
        username: &str,
    ) -> Result<MergedCatalog, CatalogError> {
        self.merge_collections(&[username]).await
    }

    async fn collect_ownership(
        &self,
        usernames: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(OwnershipMap, Vec<SkippedUser>), CatalogError> {
        let poller = &self.poller;
        let mut results = stream::iter(usernames)
            .map(|username| async move {
                let result = poller.fetch_collection(&username).await;
                (username, result)
            })
            .buffer_unordered(self.user_concurrency);

        let mut ownership = OwnershipMap::new();
        let mut skipped = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(recorded = ownership.len(), "Merge cancelled during collection fetch");
                    return Err(CatalogError::Cancelled);
                }
                next = results.next() => next,
            };
            let Some((username, result)) = next else {
                break;
            };

            match result {
                Ok(items) => {
                    debug!(username = %username, items = items.len(), "Recording collection");
                    ownership.record(&username, &items);
                }
                Err(err) => match self.policy {
                    UserFailurePolicy::Abort => {
                        error!(username = %username, error = %err, "Collection failed, aborting merge");
                        return Err(err);
                    }
                    UserFailurePolicy::Skip => {
                        warn!(username = %username, error = %err, "Collection failed, skipping user");
                        skipped.push(SkippedUser {
                            username,
                            error: err,
                        });
                    }
                },
            }
        }

        skipped.sort_by(|a, b| a.username.cmp(&b.username));
        Ok((ownership, skipped))
    }
}

/// Trimmed, non-blank usernames in first-seen order
fn distinct_usernames<S: AsRef<str>>(usernames: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    usernames
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}
