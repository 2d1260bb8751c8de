//! BGG record types
//!
//! Plain data produced by the parser and annotated by the merge engine.
//! Field names serialize in camelCase for the display layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name used when a record carries no primary name
pub const UNKNOWN_NAME: &str = "Unknown";

/// A catalog entry from the `thing` endpoint
///
/// Numeric stats default to 0 when BGG omits them. Player and play-time
/// ranges are passed through as reported, even when min exceeds max.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub game_id: u32,
    pub name: String,
    pub year_published: u32,
    pub min_players: u32,
    pub max_players: u32,
    pub playing_time: u32,
    pub min_play_time: u32,
    pub max_play_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_link: Option<String>,
    /// Usernames owning this game; only the merge engine fills this in
    #[serde(default)]
    pub owners: BTreeSet<String>,
}

impl Game {
    /// Create a game with the given id and name and all stats zeroed
    pub fn new(game_id: u32, name: impl Into<String>) -> Self {
        Self {
            game_id,
            name: name.into(),
            year_published: 0,
            min_players: 0,
            max_players: 0,
            playing_time: 0,
            min_play_time: 0,
            max_play_time: 0,
            image_link: None,
            owners: BTreeSet::new(),
        }
    }
}

/// One line of a user's owned-game list from the `collection` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    pub game_id: u32,
    /// Name as the collection endpoint reports it (not reconciled with `Game::name`)
    pub name: String,
    pub year_published: u32,
}

/// Parsed response of the `collection` endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionResponse {
    /// The collection is materialized and ready
    Ready(Vec<CollectionItem>),
    /// BGG accepted the request and is still preparing the collection
    Deferred,
}
