use crate::common::{collection_xml, request_count, test_config, DEFERRED};
use bgg_provider::catalog::CollectionPoller;
use bgg_provider::error::ParseError;
use bgg_provider::{BggClient, CatalogError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn poller_for(server: &MockServer) -> CollectionPoller {
    let config = test_config(&server.uri());
    CollectionPoller::new(
        BggClient::new(&config).unwrap(),
        config.collection_max_polls,
        config.collection_poll_interval,
    )
}

async fn mount_deferred(server: &MockServer, times: u64) {
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(202).set_body_string(DEFERRED))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_ready_after_two_deferrals() {
    let server = MockServer::start().await;
    mount_deferred(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_xml(&[13, 822])))
        .mount(&server)
        .await;

    let items = poller_for(&server).fetch_collection("alice").await.unwrap();

    let ids: Vec<u32> = items.iter().map(|item| item.game_id).collect();
    assert_eq!(ids, vec![13, 822]);
    assert_eq!(items[0].name, "Game 13");
    assert_eq!(items[0].year_published, 2010);
    assert_eq!(request_count(&server, "/collection").await, 3);
}

#[tokio::test]
async fn test_times_out_after_five_deferrals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(202).set_body_string(DEFERRED))
        .mount(&server)
        .await;

    let err = poller_for(&server).fetch_collection("alice").await.unwrap_err();

    match err {
        CatalogError::CollectionTimeout { username, attempts } => {
            assert_eq!(username, "alice");
            assert_eq!(attempts, 5);
        }
        other => panic!("expected a collection timeout, got {other:?}"),
    }
    assert_eq!(request_count(&server, "/collection").await, 5);
}

#[tokio::test]
async fn test_unreachable_service_is_not_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = poller_for(&server).fetch_collection("alice").await.unwrap_err();

    assert!(matches!(err, CatalogError::Fetch(_)));
    assert!(!err.is_still_processing());
    // One poll, retried by the pipeline up to its cap
    assert_eq!(request_count(&server, "/collection").await, 3);
}

#[tokio::test]
async fn test_invalid_username_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<errors><error><message>Invalid username specified</message></error></errors>",
        ))
        .mount(&server)
        .await;

    let err = poller_for(&server).fetch_collection("nobody").await.unwrap_err();

    match err {
        CatalogError::Parse(ParseError::Remote(message)) => {
            assert_eq!(message, "Invalid username specified")
        }
        other => panic!("expected a remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collection"))
        .respond_with(ResponseTemplate::new(200).set_body_string(collection_xml(&[])))
        .mount(&server)
        .await;

    let items = poller_for(&server).fetch_collection("alice").await.unwrap();
    assert!(items.is_empty());
}
