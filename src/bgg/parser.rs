//! BGG XML response parser
//!
//! Payloads are decoded into schema structs in which every field is an
//! explicit `Option`; a small set of policy functions then turns them into
//! [`Game`] and [`CollectionItem`] records. A missing or garbled stat never
//! fails the record, only a payload without a recognizable root does.

use crate::bgg::types::{CollectionItem, CollectionResponse, Game, UNKNOWN_NAME};
use crate::error::ParseError;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Phrase BGG uses when a collection request was queued for processing
const DEFERRED_PHRASE: &str = "has been accepted and will be processed";

// ---------------------------------------------------------------------------
// Schema: `thing` endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ThingDocument {
    #[serde(rename = "item", default)]
    items: Vec<ThingItem>,
}

#[derive(Debug, Deserialize)]
struct ThingItem {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    #[serde(rename = "name", default)]
    names: Vec<NameNode>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    yearpublished: Option<ValueNode>,
    #[serde(default)]
    minplayers: Option<ValueNode>,
    #[serde(default)]
    maxplayers: Option<ValueNode>,
    #[serde(default)]
    playingtime: Option<ValueNode>,
    #[serde(default)]
    minplaytime: Option<ValueNode>,
    #[serde(default)]
    maxplaytime: Option<ValueNode>,
}

#[derive(Debug, Deserialize)]
struct NameNode {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "@value", default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueNode {
    #[serde(rename = "@value", default)]
    value: Option<String>,
}

// ---------------------------------------------------------------------------
// Schema: `collection` endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CollectionDocument {
    #[serde(rename = "item", default)]
    items: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    #[serde(rename = "@objectid", default)]
    object_id: Option<String>,
    #[serde(default)]
    name: Option<TextNode>,
    #[serde(default)]
    yearpublished: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDocument {
    #[serde(rename = "$text", default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Schema: error documents
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ErrorsDocument {
    #[serde(rename = "error", default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEntry {
    #[serde(rename = "@message", default)]
    attribute: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorEntry {
    fn text(&self) -> Option<String> {
        self.message
            .as_deref()
            .or(self.attribute.as_deref())
            .map(normalize_whitespace)
    }
}

// ---------------------------------------------------------------------------
// Field policies
// ---------------------------------------------------------------------------

/// Parse a numeric stat, falling back to 0 when absent or unparsable.
fn number_or_zero(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse().ok()).unwrap_or(0)
}

fn value_of(node: &Option<ValueNode>) -> Option<&str> {
    node.as_ref().and_then(|n| n.value.as_deref())
}

fn text_of(node: &Option<TextNode>) -> Option<&str> {
    node.as_ref()
        .and_then(|n| n.text.as_deref())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn parse_id(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|value| value.trim().parse().ok())
}

/// The `type="primary"` name among a game's alternate names.
fn primary_name(names: &[NameNode]) -> Option<&str> {
    names
        .iter()
        .find(|name| name.kind.as_deref() == Some("primary"))
        .and_then(|name| name.value.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ThingItem {
    fn into_game(self) -> Option<Game> {
        let game_id = parse_id(self.id.as_deref())?;

        Some(Game {
            game_id,
            name: primary_name(&self.names).unwrap_or(UNKNOWN_NAME).to_string(),
            year_published: number_or_zero(value_of(&self.yearpublished)),
            min_players: number_or_zero(value_of(&self.minplayers)),
            max_players: number_or_zero(value_of(&self.maxplayers)),
            playing_time: number_or_zero(value_of(&self.playingtime)),
            min_play_time: number_or_zero(value_of(&self.minplaytime)),
            max_play_time: number_or_zero(value_of(&self.maxplaytime)),
            image_link: self
                .image
                .map(|link| link.trim().to_string())
                .filter(|link| !link.is_empty()),
            owners: BTreeSet::new(),
        })
    }
}

impl CollectionEntry {
    fn into_item(self) -> Option<CollectionItem> {
        let game_id = parse_id(self.object_id.as_deref())?;

        Some(CollectionItem {
            game_id,
            name: text_of(&self.name).unwrap_or(UNKNOWN_NAME).to_string(),
            year_published: number_or_zero(text_of(&self.yearpublished)),
        })
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Local name of the document's root element.
fn root_name(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                return Ok(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            }
            Event::Eof => return Err(ParseError::EmptyDocument),
            _ => {}
        }
    }
}

/// Turn an `<error>`/`<errors>` document into a [`ParseError::Remote`].
fn remote_error(root: &str, xml: &str) -> ParseError {
    let message = match root {
        "errors" => quick_xml::de::from_str::<ErrorsDocument>(xml)
            .ok()
            .and_then(|doc| doc.errors.iter().find_map(ErrorEntry::text)),
        _ => quick_xml::de::from_str::<ErrorEntry>(xml)
            .ok()
            .and_then(|entry| entry.text()),
    };
    ParseError::Remote(message.unwrap_or_else(|| "unspecified error".to_string()))
}

/// Parse a `thing` response that may carry any number of items.
///
/// Items without a usable id are skipped; the order of the returned games
/// follows the document.
pub fn parse_games(xml: &str) -> Result<Vec<Game>, ParseError> {
    let root = root_name(xml)?;
    if root == "error" || root == "errors" {
        return Err(remote_error(&root, xml));
    }

    let document: ThingDocument = quick_xml::de::from_str(xml)?;
    let total = document.items.len();
    let games: Vec<Game> = document
        .items
        .into_iter()
        .filter_map(|item| {
            let raw_id = item.id.clone();
            let game = item.into_game();
            if game.is_none() {
                warn!(id = ?raw_id, "Skipping thing item without a usable id");
            }
            game
        })
        .collect();

    debug!(items = total, parsed = games.len(), "Parsed thing response");
    Ok(games)
}

/// Parse a `thing` response for a single game.
pub fn parse_game(xml: &str) -> Result<Game, ParseError> {
    parse_games(xml)?
        .into_iter()
        .next()
        .ok_or(ParseError::MissingItem)
}

/// Parse a `collection` response.
///
/// A `<message>` root announcing that the request was queued yields
/// [`CollectionResponse::Deferred`]; any other message is an error. Every
/// other root is read as the item list, which may be empty.
pub fn parse_collection(xml: &str) -> Result<CollectionResponse, ParseError> {
    let root = root_name(xml)?;
    match root.as_str() {
        "message" => {
            let document: MessageDocument = quick_xml::de::from_str(xml)?;
            let text = normalize_whitespace(document.text.as_deref().unwrap_or_default());
            if text.to_lowercase().contains(DEFERRED_PHRASE) {
                Ok(CollectionResponse::Deferred)
            } else {
                Err(ParseError::UnexpectedMessage(text))
            }
        }
        "error" | "errors" => Err(remote_error(&root, xml)),
        _ => {
            let document: CollectionDocument = quick_xml::de::from_str(xml)?;
            let items: Vec<CollectionItem> = document
                .items
                .into_iter()
                .filter_map(|entry| {
                    let raw_id = entry.object_id.clone();
                    let item = entry.into_item();
                    if item.is_none() {
                        warn!(objectid = ?raw_id, "Skipping collection item without a usable id");
                    }
                    item
                })
                .collect();
            debug!(items = items.len(), "Parsed collection response");
            Ok(CollectionResponse::Ready(items))
        }
    }
}
