// tests/rotation_tests.rs

mod common;

use common::{client_for, client_with, keys_used, mount_for_key, ok_text, TestConfigBuilder};
use gemini_quota_client::{ClientConfig, ClientError, RotatingClient};
use reqwest::StatusCode;
use rstest::rstest;
use std::time::{Duration, Instant};
use wiremock::{MockServer, ResponseTemplate};

#[test]
fn test_blank_credentials_fail_construction() {
    for keys in [vec![], vec![""], vec!["  ", "\t"]] {
        let err = RotatingClient::new(keys, ClientConfig::default()).unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));
    }
}

#[tokio::test]
async fn test_recoverable_failures_exhaust_every_key() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ResponseTemplate::new(500)).await;
    mount_for_key(&server, "key-c", ResponseTemplate::new(503)).await;
    let client = client_for(&server, &["key-a", "key-b", "key-c"]);

    let err = client.call("hello", None).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::CredentialsExhausted {
            credentials: 3,
            attempts: 3
        }
    ));
    assert!(err.is_retryable_later());
    let stats = client.stats();
    assert_eq!(stats.cursor, 0);
    assert_eq!(stats.error_counts, vec![1, 1, 1]);
    assert_eq!(stats.request_counts, vec![0, 0, 0]);
    assert_eq!(keys_used(&server).await, vec!["key-a", "key-b", "key-c"]);
}

#[tokio::test]
async fn test_transport_errors_are_recoverable() {
    let client = client_with(TestConfigBuilder::new(), &["key-a", "key-b"]);

    let err = client.call("hello", None).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::CredentialsExhausted {
            credentials: 2,
            attempts: 2
        }
    ));
    assert_eq!(client.stats().error_counts, vec![1, 1]);
    assert_eq!(client.stats().cursor, 0);
}

#[tokio::test]
async fn test_request_timeout_rotates_to_next_key() {
    let server = MockServer::start().await;
    mount_for_key(
        &server,
        "key-a",
        ok_text("too slow").set_delay(Duration::from_secs(3)),
    )
    .await;
    mount_for_key(&server, "key-b", ok_text("fast")).await;
    let client = client_with(
        TestConfigBuilder::new()
            .with_base_url(server.uri())
            .with_request_timeout(1),
        &["key-a", "key-b"],
    );

    let payload = client.call("hello", None).await.unwrap();

    assert_eq!(
        gemini_quota_client::client::extract_text(&payload),
        Some("fast")
    );
    let stats = client.stats();
    assert_eq!(stats.error_counts, vec![1, 0]);
    assert_eq!(stats.request_counts, vec![0, 1]);
    assert_eq!(stats.cursor, 1);
}

#[rstest]
#[case(400)]
#[case(401)]
#[case(403)]
#[case(404)]
#[tokio::test]
async fn test_client_errors_are_terminal(#[case] status: u16) {
    let server = MockServer::start().await;
    mount_for_key(
        &server,
        "key-a",
        ResponseTemplate::new(status).set_body_string("rejected"),
    )
    .await;
    mount_for_key(&server, "key-b", ok_text("unreachable")).await;
    let client = client_with(
        TestConfigBuilder::new()
            .with_base_url(server.uri())
            .with_backoff(5_000, 5_000),
        &["key-a", "key-b"],
    );

    let started = Instant::now();
    let err = client.call("hello", None).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2), "no backoff expected");
    match err {
        ClientError::ClientRequest { status: got, body } => {
            assert_eq!(got, StatusCode::from_u16(status).unwrap());
            assert_eq!(body, "rejected");
        }
        other => panic!("expected ClientRequest, got {other:?}"),
    }
    let stats = client.stats();
    assert_eq!(stats.cursor, 0);
    assert_eq!(stats.error_counts, vec![0, 0]);
    assert_eq!(keys_used(&server).await, vec!["key-a"]);
}

#[tokio::test]
async fn test_success_accounting() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ok_text("hi there")).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    let payload = client.call("hello", None).await.unwrap();

    assert_eq!(
        gemini_quota_client::client::extract_text(&payload),
        Some("hi there")
    );
    let stats = client.stats();
    assert_eq!(stats.request_counts, vec![1, 0]);
    assert_eq!(stats.error_counts, vec![0, 0]);
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.cursor, 0);
    assert_eq!(stats.success_rate_display(), "100.0%");
}

#[tokio::test]
async fn test_rotation_is_strict_round_robin() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ResponseTemplate::new(500)).await;
    mount_for_key(
        &server,
        "key-c",
        ResponseTemplate::new(200).set_body_string("not json"),
    )
    .await;
    let client = client_for(&server, &["key-a", "key-b", "key-c"]);

    for _ in 0..2 {
        let err = client.call("hello", None).await.unwrap_err();
        assert!(matches!(err, ClientError::CredentialsExhausted { attempts: 3, .. }));
    }

    assert_eq!(
        keys_used(&server).await,
        vec!["key-a", "key-b", "key-c", "key-a", "key-b", "key-c"]
    );
    assert_eq!(client.stats().error_counts, vec![2, 2, 2]);
    assert_eq!(client.stats().cursor, 0);
}

#[tokio::test]
async fn test_next_call_starts_on_last_working_key() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ok_text("ok")).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    client.call("first", None).await.unwrap();
    client.call("second", None).await.unwrap();

    assert_eq!(keys_used(&server).await, vec!["key-a", "key-b", "key-b"]);
    assert_eq!(client.stats().request_counts, vec![0, 2]);
}

#[tokio::test]
async fn test_quota_then_success_end_to_end() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ok_text("second key answered")).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    let payload = client.call("hello", None).await.unwrap();

    assert_eq!(
        payload["candidates"][0]["content"]["parts"][0]["text"],
        "second key answered"
    );
    let stats = client.stats();
    assert_eq!(stats.error_counts[0], 1);
    assert_eq!(stats.request_counts[1], 1);
    assert_eq!(stats.cursor, 1);
}

#[tokio::test]
async fn test_backoff_is_applied_between_attempts() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(500)).await;
    mount_for_key(&server, "key-b", ResponseTemplate::new(500)).await;
    let client = client_with(
        TestConfigBuilder::new()
            .with_base_url(server.uri())
            .with_backoff(50, 2_000),
        &["key-a", "key-b"],
    );

    let started = Instant::now();
    assert!(client.call("hello", None).await.is_err());

    // 50ms after the first failure, 100ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_non_json_success_body_counts_as_decode_failure() {
    let server = MockServer::start().await;
    mount_for_key(
        &server,
        "key-a",
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
    )
    .await;
    let client = client_for(&server, &["key-a"]);

    let err = client.call("hello", None).await.unwrap_err();

    assert!(matches!(err, ClientError::Decode { attempts: 1, .. }));
    assert_eq!(client.stats().request_counts, vec![0]);
    assert_eq!(client.stats().error_counts, vec![1]);
}

#[tokio::test]
async fn test_system_instruction_and_model_are_sent() {
    let server = MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/models/gemini-test:generateContent"))
        .and(wiremock::matchers::body_partial_json(serde_json::json!({
            "systemInstruction": {"parts": [{"text": "be brief"}]},
            "contents": [{"parts": [{"text": "hello"}]}]
        })))
        .respond_with(ok_text("short"))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server, &["key-a"]);

    let payload = client
        .call_with_system("be brief", "hello", Some("gemini-test"))
        .await
        .unwrap();

    assert_eq!(
        gemini_quota_client::client::extract_text(&payload),
        Some("short")
    );
}

#[tokio::test]
async fn test_blank_system_instruction_is_omitted() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ok_text("ok")).await;
    let client = client_for(&server, &["key-a"]);

    client.call_with_system("   ", "hello", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("systemInstruction").is_none(), "{body}");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
}

#[tokio::test]
async fn test_blank_prompt_fails_before_any_request() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ok_text("ok")).await;
    let client = client_for(&server, &["key-a"]);

    let plain = client.call("", None).await.unwrap_err();
    let structured = client
        .call_structured(" \n", &serde_json::json!({"type": "OBJECT"}), None)
        .await
        .unwrap_err();
    let with_system = client.call_with_system("sys", "\t", None).await.unwrap_err();

    for err in [plain, structured, with_system] {
        assert!(matches!(err, ClientError::InvalidRequest { .. }), "{err:?}");
        assert!(!err.is_retryable_later());
    }
    assert!(keys_used(&server).await.is_empty());
    assert_eq!(client.stats().error_counts, vec![0]);
}

#[tokio::test]
async fn test_reset_stats() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ok_text("ok")).await;
    let client = client_for(&server, &["key-a", "key-b"]);
    client.call("hello", None).await.unwrap();

    client.reset_stats();

    let stats = client.stats();
    assert_eq!(stats.cursor, 0);
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.error_counts, vec![0, 0]);
    assert_eq!(stats.success_rate_display(), "N/A");
}

#[tokio::test]
async fn test_concurrent_calls_are_serialized() {
    let server = MockServer::start().await;
    mount_for_key(
        &server,
        "key-a",
        ok_text("ok").set_delay(Duration::from_millis(20)),
    )
    .await;
    let client = std::sync::Arc::new(client_for(&server, &["key-a"]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move { client.call(&format!("prompt {i}"), None).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = client.stats();
    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.request_counts, vec![8]);
}
