// Shared fixtures: fast test configuration and canned BGG payloads

use bgg_provider::bgg::RetryPolicy;
use bgg_provider::BggConfig;
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

pub const DEFERRED: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?>
<message>
	Your request for this collection has been accepted and will be processed.  Please try again later for access.
</message>"#;

/// Configuration pointing at `base_url` with millisecond-scale delays
pub fn test_config(base_url: &str) -> BggConfig {
    BggConfig {
        base_url: base_url.to_string(),
        request_timeout: Duration::from_secs(5),
        rate_limit_interval: Duration::from_millis(1),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            rejection_fallback: Duration::from_millis(5),
            max_rejections: 10,
        },
        collection_poll_interval: Duration::from_millis(10),
        ..BggConfig::default()
    }
}

/// `thing` response with one item per id
pub fn thing_xml(ids: &[u32]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<item type="boardgame" id="{id}">
    <name type="primary" sortindex="1" value="Game {id}" />
    <yearpublished value="2010" />
    <minplayers value="2" />
    <maxplayers value="4" />
    <playingtime value="60" />
    <minplaytime value="30" />
    <maxplaytime value="60" />
</item>"#
            )
        })
        .collect();
    format!(r#"<?xml version="1.0" encoding="utf-8"?><items termsofuse="https://boardgamegeek.com/xmlapi/termsofuse">{items}</items>"#)
}

/// `collection` response listing the given ids as owned
pub fn collection_xml(ids: &[u32]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<item objecttype="thing" objectid="{id}" subtype="boardgame" collid="{id}">
    <name sortindex="1">Game {id}</name>
    <yearpublished>2010</yearpublished>
    <status own="1" />
</item>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?><items totalitems="{}">{items}</items>"#,
        ids.len()
    )
}

/// Ids requested by a `thing` call
pub fn requested_ids(request: &Request) -> Vec<u32> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| {
            value
                .split(',')
                .filter_map(|id| id.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Answers a `thing` request with exactly the ids it asked for
pub struct ThingEcho;

impl Respond for ThingEcho {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(thing_xml(&requested_ids(request)))
    }
}

/// Number of requests the mock server has seen on `path`
pub async fn request_count(server: &wiremock::MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .count()
}
