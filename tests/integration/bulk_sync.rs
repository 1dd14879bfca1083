//! Integration tests for bulk sync orchestration

use super::*;
use airbyte_client::{AirbyteError, JobStatus, SyncReport};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::Mock;

async fn mount_connection(server: &MockServer, connection_id: &str, polls: &[serde_json::Value]) {
    mock_post_with_auth("connections/sync")
        .and(body_partial_json(json!({"connectionId": connection_id})))
        .respond_with(success_response(json!({"jobId": 42, "status": "running"})))
        .expect(1)
        .mount(server)
        .await;

    let (last, earlier) = polls.split_last().expect("at least one poll response");
    for body in earlier {
        mock_post_with_auth("connections/get")
            .and(body_partial_json(json!({"connectionId": connection_id})))
            .respond_with(success_response(body.clone()))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
    mock_post_with_auth("connections/get")
        .and(body_partial_json(json!({"connectionId": connection_id})))
        .respond_with(success_response(last.clone()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_bulk_sync_polls_until_terminal_status() {
    let mock_server = setup_mock_server().await;

    mount_connection(
        &mock_server,
        "c1",
        &[
            json!({"status": "active", "latestStatus": {"status": "running"}}),
            json!({"status": "active", "latestStatus": {"status": "running", "recordsSynced": 10}}),
            json!({"status": "active", "latestStatus": {"status": "succeeded", "recordsSynced": 25}}),
        ],
    )
    .await;
    mount_connection(
        &mock_server,
        "c2",
        &[json!({"status": "active", "latestStatus": {"status": "failed"}})],
    )
    .await;

    let client = test_client(&mock_server);
    let ids = vec!["c1".to_string(), "c2".to_string()];
    let results = client.bulk_sync(&ids, Some(2)).await;

    let c1 = results[0].as_ref().unwrap();
    assert_eq!(c1.connection_id, "c1");
    assert_eq!(c1.status, JobStatus::Succeeded);
    assert_eq!(c1.records_synced, 25);
    assert!(c1.end_time.is_some());

    let c2 = results[1].as_ref().unwrap();
    assert_eq!(c2.status, JobStatus::Failed);

    let report = SyncReport::from_results(ids.iter().map(String::as_str).zip(results.iter()));
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.failure_count(), 1);
}

#[tokio::test]
async fn test_bulk_sync_isolates_trigger_failures() {
    let mock_server = setup_mock_server().await;

    mount_connection(
        &mock_server,
        "ok",
        &[json!({"status": "active", "latestStatus": {"status": "succeeded"}})],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/connections/sync"))
        .and(body_partial_json(json!({"connectionId": "missing"})))
        .respond_with(error_response(404, "Connection not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let results = client.bulk_sync(&["missing", "ok"], Some(1)).await;

    assert!(matches!(results[0], Err(AirbyteError::NotFound { .. })));
    assert_eq!(results[1].as_ref().unwrap().status, JobStatus::Succeeded);
}
