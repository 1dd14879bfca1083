//! Integration tests for retries and circuit breaking

use super::*;
use airbyte_client::resilience::CircuitState;
use airbyte_client::services::{ConnectionsService, WorkspacesService};
use airbyte_client::{AirbyteError, ExecuteOptions, LogicalOperation};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::Mock;

#[tokio::test]
async fn test_transient_errors_are_retried_until_success() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/workspaces/get"))
        .respond_with(error_response(503, "Service unavailable"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/workspaces/get"))
        .respond_with(success_response(json!({"workspaceId": "ws-1", "name": "Main"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let details = client.workspaces().get("ws-1").await.unwrap();

    assert_eq!(details.workspace_id, "ws-1");
    assert_eq!(client.metrics().get_metrics().retries, 2);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/workspaces/get"))
        .respond_with(error_response(500, "boom"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.workspaces().get("ws-1").await.unwrap_err();

    match err {
        AirbyteError::RequestFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("Expected RequestFailed, got {:?}", other),
    }
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_sync_trigger_is_never_retried() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/connections/sync"))
        .respond_with(error_response(502, "Bad gateway"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.connections().trigger_sync("c1").await.unwrap_err();

    assert!(matches!(
        err,
        AirbyteError::TransientTransport {
            status: Some(502),
            ..
        }
    ));
}

#[tokio::test]
async fn test_circuit_opens_after_consecutive_failures() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/connections/sync"))
        .respond_with(error_response(500, "boom"))
        .mount(&mock_server)
        .await;

    let config = AirbyteConfig::builder()
        .base_url(mock_server.uri())
        .basic_auth("airbyte", "password")
        .circuit_failure_threshold(2)
        .circuit_recovery_timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let client = AirbyteClient::new(config).unwrap();

    for _ in 0..2 {
        assert!(client.connections().trigger_sync("c1").await.is_err());
    }
    let err = client.connections().trigger_sync("c1").await.unwrap_err();

    assert!(matches!(err, AirbyteError::CircuitOpen { .. }));
    assert_eq!(
        client.executor().circuit_breaker().state("connections/sync"),
        CircuitState::Open
    );
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);

    // other endpoints have their own circuit
    assert_eq!(
        client.executor().circuit_breaker().state("connections/get"),
        CircuitState::Closed
    );
}

/// Serves every connection a response whose body is cut short of its
/// `Content-Length`, then closes the socket.
async fn spawn_truncating_server(connections: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            connections.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = "HTTP/1.1 200 OK\r\n\
                                Content-Type: application/json\r\n\
                                Content-Length: 100\r\n\r\n\
                                {\"available\":";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_truncated_body_is_retried_as_transient() {
    let connections = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_truncating_server(connections.clone()).await;

    let config = AirbyteConfig::builder()
        .base_url(base_url)
        .basic_auth("airbyte", "password")
        .retry_delays(Duration::from_millis(10), Duration::from_millis(50))
        .build()
        .unwrap();
    let client = AirbyteClient::new(config).unwrap();

    let err = client
        .execute(LogicalOperation::get("health"), ExecuteOptions::fresh())
        .await
        .unwrap_err();

    match &err {
        AirbyteError::RequestFailed { attempts, source } => {
            assert_eq!(*attempts, 3);
            assert!(source.is_retryable(), "unexpected source: {:?}", source);
        }
        other => panic!("Expected RequestFailed, got {:?}", other),
    }
    assert!(err.trips_circuit());
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    assert_eq!(
        client.executor().circuit_breaker().consecutive_failures("health"),
        1
    );
}
