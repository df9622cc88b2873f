//! FCM HTTP client tests against a mock FCM / OAuth server.
//!
//! ```bash
//! cargo test -p bingo-dispatcher --test fcm
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bingo_dispatcher::message::{MulticastMessage, PushNotification};
use bingo_dispatcher::messaging::{
    FcmClient, Messaging, MessagingError, ServiceAccountKey, TokenSource,
};

const SEND_PATH: &str = "/v1/projects/bingo-test/messages:send";

// ============================================================
// Helpers
// ============================================================

fn message(tokens: &[&str]) -> MulticastMessage {
    MulticastMessage {
        notification: PushNotification {
            title: "New Bingo Number Called!".to_string(),
            body: "Number 42 has been called".to_string(),
        },
        data: BTreeMap::from([
            ("type".to_string(), "numberCalled".to_string()),
            ("number".to_string(), "42".to_string()),
            ("gameId".to_string(), "game-1".to_string()),
        ]),
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
    }
}

fn static_client(server: &MockServer) -> FcmClient {
    FcmClient::new(
        server.uri(),
        "bingo-test",
        TokenSource::Static("static-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap()
}

async fn mount_delivered(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({"message": {"token": token}})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": format!("projects/bingo-test/messages/{}", token)})),
        )
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================
// Multicast delivery
// ============================================================

#[tokio::test]
async fn test_all_tokens_delivered() {
    let server = MockServer::start().await;
    mount_delivered(&server, "t1").await;
    mount_delivered(&server, "t2").await;

    let batch = static_client(&server)
        .send_each_for_multicast(&message(&["t1", "t2"]))
        .await
        .unwrap();

    assert_eq!(batch.success_count, 2);
    assert_eq!(batch.failure_count, 0);
    assert_eq!(
        batch.responses[0].message_id.as_deref(),
        Some("projects/bingo-test/messages/t1")
    );
    assert_eq!(
        batch.responses[1].message_id.as_deref(),
        Some("projects/bingo-test/messages/t2")
    );
}

#[tokio::test]
async fn test_request_carries_notification_and_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer static-token"))
        .and(body_partial_json(json!({
            "message": {
                "token": "t1",
                "notification": {
                    "title": "New Bingo Number Called!",
                    "body": "Number 42 has been called"
                },
                "data": {"type": "numberCalled", "number": "42", "gameId": "game-1"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "m1"})))
        .expect(1)
        .mount(&server)
        .await;

    let batch = static_client(&server)
        .send_each_for_multicast(&message(&["t1"]))
        .await
        .unwrap();

    assert_eq!(batch.success_count, 1);
}

#[tokio::test]
async fn test_per_token_failure_is_counted_not_raised() {
    let server = MockServer::start().await;
    mount_delivered(&server, "good").await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({"message": {"token": "stale"}})))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        })))
        .mount(&server)
        .await;

    let batch = static_client(&server)
        .send_each_for_multicast(&message(&["stale", "good"]))
        .await
        .unwrap();

    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.failure_count, 1);
    assert!(!batch.responses[0].success);
    assert_eq!(batch.responses[0].error.as_deref(), Some("UNREGISTERED"));
    assert!(batch.responses[1].success);
}

#[tokio::test]
async fn test_server_error_without_body_is_per_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let batch = static_client(&server)
        .send_each_for_multicast(&message(&["t1", "t2"]))
        .await
        .unwrap();

    assert_eq!(batch.failure_count, 2);
    assert_eq!(batch.responses[0].error.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn test_too_many_tokens_fails_whole_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tokens: Vec<String> = (0..501).map(|i| format!("t{}", i)).collect();
    let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let result = static_client(&server)
        .send_each_for_multicast(&message(&refs))
        .await;

    assert!(matches!(result, Err(MessagingError::InvalidMessage(_))));
}

// ============================================================
// Service-account authentication
// ============================================================

fn service_account_client(server: &MockServer) -> FcmClient {
    let key = ServiceAccountKey {
        client_email: "dispatcher@bingo-test.iam.gserviceaccount.com".to_string(),
        private_key: include_str!("fixtures/test_service_account.pem").to_string(),
        token_uri: format!("{}/token", server.uri()),
        project_id: Some("bingo-test".to_string()),
    };
    FcmClient::new(
        server.uri(),
        "bingo-test",
        TokenSource::service_account(key).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_service_account_token_is_exchanged_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("jwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "exchanged-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer exchanged-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "m"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = service_account_client(&server);
    for _ in 0..2 {
        let batch = client
            .send_each_for_multicast(&message(&["t1"]))
            .await
            .unwrap();
        assert_eq!(batch.success_count, 1);
    }
}

#[tokio::test]
async fn test_token_endpoint_rejection_fails_whole_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = service_account_client(&server)
        .send_each_for_multicast(&message(&["t1"]))
        .await;

    match result {
        Err(MessagingError::Auth(msg)) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected auth error, got {:?}", other),
    }
}
