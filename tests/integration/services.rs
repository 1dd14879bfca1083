//! Integration tests for the resource services

use super::*;
use airbyte_client::services::{
    ConnectionsService, DestinationsService, SourcesService, WorkspacesService,
};
use airbyte_client::{AirbyteError, CreateSourceRequest};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_requests_carry_auth_and_request_id() {
    let mock_server = setup_mock_server().await;

    mock_post_with_auth("workspaces/get")
        .and(header_exists("X-Request-Id"))
        .and(body_json(json!({"workspaceId": "ws-1"})))
        .respond_with(success_response(json!({
            "workspaceId": "ws-1",
            "name": "Analytics"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let details = client.workspaces().get("ws-1").await.unwrap();

    assert_eq!(details.name, "Analytics");
}

#[tokio::test]
async fn test_list_sources_is_served_from_cache() {
    let mock_server = setup_mock_server().await;

    mock_post_with_auth("sources/list")
        .and(body_partial_json(json!({"workspaceId": "ws-1", "includeDeleted": false})))
        .respond_with(success_response(json!({"sources": [{"sourceId": "s1"}]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let first = client.sources().list("ws-1", 20, 0).await.unwrap();
    let second = client.sources().list("ws-1", 20, 0).await.unwrap();

    assert_eq!(first, second);
    let stats = client.executor().cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_create_source_validation_happens_before_sending() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/sources/create"))
        .respond_with(success_response(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let configuration = json!({"start_date": "2024-01-01"})
        .as_object()
        .cloned()
        .unwrap();
    let request = CreateSourceRequest::new("stripe", "ws-1", "def-1", configuration);

    let err = client.sources().create(request).await.unwrap_err();

    assert!(matches!(err, AirbyteError::Validation { .. }));
    assert!(err.to_string().contains("api_key"));
}

#[tokio::test]
async fn test_delete_connection_with_no_content() {
    let mock_server = setup_mock_server().await;

    mock_post_with_auth("connections/delete")
        .and(body_json(json!({"connectionId": "c1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    client.connections().delete("c1").await.unwrap();
}

#[tokio::test]
async fn test_authentication_error_is_not_retried() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/destinations/list"))
        .respond_with(error_response(401, "Invalid credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.destinations().list("ws-1", 20).await.unwrap_err();

    match err {
        AirbyteError::Authentication { message } => assert_eq!(message, "Invalid credentials"),
        other => panic!("Expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_check_uses_get() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(success_response(json!({"available": true})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);

    assert!(client.health_check().await);
    // never cached
    assert!(client.health_check().await);
}
