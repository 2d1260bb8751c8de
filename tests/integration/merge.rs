use crate::common::{collection_xml, request_count, test_config, thing_xml, ThingEcho, DEFERRED};
use bgg_provider::catalog::UserFailurePolicy;
use bgg_provider::config::BggConfig;
use bgg_provider::{BggClient, CatalogError, MergeEngine};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn engine_with(config: &BggConfig) -> MergeEngine {
    MergeEngine::new(BggClient::new(config).unwrap(), config)
}

fn owners(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

async fn mount_collection(server: &MockServer, username: &str, ids: &[u32]) {
    Mock::given(method("GET"))
        .and(path("/collection"))
        .and(query_param("username", username))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_xml(ids)))
        .mount(server)
        .await;
}

async fn mount_thing_echo(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/thing"))
        .respond_with(ThingEcho)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_two_users_merge_with_owner_sets() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1, 2]).await;
    mount_collection(&server, "bob", &[2, 3]).await;
    mount_thing_echo(&server).await;

    let engine = engine_with(&test_config(&server.uri()));
    let catalog = engine.merge_collections(&["alice", "bob"]).await.unwrap();

    let ids: Vec<u32> = catalog.games.iter().map(|g| g.game_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let ownership = catalog.ownership();
    assert_eq!(ownership[&1], owners(&["alice"]));
    assert_eq!(ownership[&2], owners(&["alice", "bob"]));
    assert_eq!(ownership[&3], owners(&["bob"]));

    assert!(catalog.complete);
    assert!(catalog.failed_chunks.is_empty());
    assert!(catalog.skipped_users.is_empty());

    // Distinct ids fit one chunk
    assert_eq!(request_count(&server, "/thing").await, 1);
}

#[tokio::test]
async fn test_concurrent_users_share_the_rate_limit() {
    let server = MockServer::start().await;
    let users = ["alice", "bob", "carol", "dave"];
    for (index, user) in users.iter().enumerate() {
        mount_collection(&server, user, &[index as u32 + 1]).await;
    }
    mount_thing_echo(&server).await;

    // Every user is polled at once but the limiter admits one per 50ms
    let mut config = test_config(&server.uri());
    config.rate_limit_interval = Duration::from_millis(50);
    config.user_concurrency = 4;

    let catalog = engine_with(&config).merge_collections(&users).await.unwrap();

    let ownership = catalog.ownership();
    assert_eq!(ownership.len(), 4);
    for (index, user) in users.iter().enumerate() {
        assert_eq!(ownership[&(index as u32 + 1)], owners(&[*user]));
    }
    assert_eq!(request_count(&server, "/collection").await, 4);
    assert_eq!(request_count(&server, "/thing").await, 1);
}

#[tokio::test]
async fn test_duplicate_usernames_are_fetched_once() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1]).await;
    mount_thing_echo(&server).await;

    let engine = engine_with(&test_config(&server.uri()));
    let catalog = engine
        .merge_collections(&["alice", " alice ", ""])
        .await
        .unwrap();

    assert_eq!(catalog.games.len(), 1);
    assert_eq!(catalog.games[0].owners, owners(&["alice"]));
    assert_eq!(request_count(&server, "/collection").await, 1);
}

#[tokio::test]
async fn test_merge_is_repeatable() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1, 2]).await;
    mount_collection(&server, "bob", &[2, 3]).await;
    mount_thing_echo(&server).await;

    let engine = engine_with(&test_config(&server.uri()));
    let first = engine.merge_collections(&["alice", "bob"]).await.unwrap();
    let second = engine.merge_collections(&["bob", "alice"]).await.unwrap();

    assert_eq!(first.ownership(), second.ownership());
}

#[tokio::test]
async fn test_failing_user_aborts_by_default() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .and(query_param("username", "ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_thing_echo(&server).await;

    let config = test_config(&server.uri());
    assert_eq!(config.user_failure_policy, UserFailurePolicy::Abort);

    let err = engine_with(&config)
        .merge_collections(&["alice", "ghost"])
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Fetch(_)));
    assert_eq!(request_count(&server, "/thing").await, 0);
}

#[tokio::test]
async fn test_failing_user_is_skipped_when_configured() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .and(query_param("username", "ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_thing_echo(&server).await;

    let mut config = test_config(&server.uri());
    config.user_failure_policy = UserFailurePolicy::Skip;

    let catalog = engine_with(&config)
        .merge_collections(&["alice", "ghost"])
        .await
        .unwrap();

    assert_eq!(catalog.games.len(), 1);
    assert_eq!(catalog.games[0].owners, owners(&["alice"]));
    assert_eq!(catalog.skipped_users.len(), 1);
    assert_eq!(catalog.skipped_users[0].username, "ghost");
}

#[tokio::test]
async fn test_collection_timeout_propagates() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .and(query_param("username", "slow"))
        .respond_with(ResponseTemplate::new(202).set_body_string(DEFERRED))
        .mount(&server)
        .await;
    mount_thing_echo(&server).await;

    let err = engine_with(&test_config(&server.uri()))
        .merge_collections(&["alice", "slow"])
        .await
        .unwrap_err();

    assert!(err.is_still_processing());
}

#[tokio::test]
async fn test_unrequested_game_has_no_owners() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[1]).await;
    Mock::given(method("GET"))
        .and(path("/thing"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thing_xml(&[1, 99])))
        .mount(&server)
        .await;

    let catalog = engine_with(&test_config(&server.uri()))
        .merge_collections(&["alice"])
        .await
        .unwrap();

    let ownership = catalog.ownership();
    assert_eq!(ownership[&1], owners(&["alice"]));
    assert!(ownership[&99].is_empty());
}

#[tokio::test]
async fn test_single_user_with_details() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[13, 822]).await;
    mount_thing_echo(&server).await;

    let catalog = engine_with(&test_config(&server.uri()))
        .fetch_collection_with_details("alice")
        .await
        .unwrap();

    assert_eq!(catalog.games.len(), 2);
    assert!(catalog
        .games
        .iter()
        .all(|game| game.owners == owners(&["alice"]) && game.max_play_time == 60));
}

#[tokio::test]
async fn test_empty_collections_skip_detail_fetch() {
    let server = MockServer::start().await;
    mount_collection(&server, "alice", &[]).await;
    mount_thing_echo(&server).await;

    let catalog = engine_with(&test_config(&server.uri()))
        .merge_collections(&["alice"])
        .await
        .unwrap();

    assert!(catalog.games.is_empty());
    assert_eq!(request_count(&server, "/thing").await, 0);
}

/// Answers "still processing" and fires `cancel` as soon as it is asked
struct DeferAndCancel(CancellationToken);

impl Respond for DeferAndCancel {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.0.cancel();
        ResponseTemplate::new(202).set_body_string(DEFERRED)
    }
}

#[tokio::test]
async fn test_cancel_while_polling_collections() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(DeferAndCancel(cancel.clone()))
        .mount(&server)
        .await;
    mount_thing_echo(&server).await;

    let err = engine_with(&test_config(&server.uri()))
        .merge_collections_until(&["alice"], &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Cancelled));
    // Polling stops at the first deferral instead of running out its budget
    assert_eq!(request_count(&server, "/collection").await, 1);
    assert_eq!(request_count(&server, "/thing").await, 0);
}
