// tests/structured_tests.rs

mod common;

use common::{client_for, keys_used, mount_for_key, ok_text, GENERATE_PATH};
use gemini_quota_client::rules::{Context, LogicEngine, RuleSynthesizer};
use gemini_quota_client::ClientError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_structured_call_returns_parsed_inner_json() {
    let server = MockServer::start().await;
    let schema = json!({
        "type": "OBJECT",
        "properties": {"answer": {"type": "INTEGER"}}
    });
    Mock::given(method("POST"))
        .and(path_regex(GENERATE_PATH))
        .and(body_partial_json(json!({
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        })))
        .respond_with(ok_text(r#"{"answer": 42}"#))
        .expect(1)
        .mount(&server)
        .await;
    let client = client_for(&server, &["key-a"]);

    let value = client
        .call_structured("what is the answer?", &schema, None)
        .await
        .unwrap();

    assert_eq!(value, json!({"answer": 42}));
    assert_eq!(client.stats().request_counts, vec![1]);
}

#[tokio::test]
async fn test_garbage_on_every_key_is_decode_error() {
    let server = MockServer::start().await;
    for key in ["key-a", "key-b", "key-c"] {
        mount_for_key(&server, key, ok_text("definitely { not json")).await;
    }
    let client = client_for(&server, &["key-a", "key-b", "key-c"]);

    let err = client
        .call_structured("p", &json!({"type": "OBJECT"}), None)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ClientError::Decode { attempts: 3, .. }),
        "got {err:?}"
    );
    let stats = client.stats();
    assert_eq!(stats.error_counts, vec![1, 1, 1]);
    assert_eq!(stats.request_counts, vec![0, 0, 0]);
    assert_eq!(stats.cursor, 0);
}

#[tokio::test]
async fn test_mixed_decode_and_quota_failures_exhaust() {
    let server = MockServer::start().await;
    mount_for_key(&server, "key-a", ok_text("nope")).await;
    mount_for_key(&server, "key-b", ResponseTemplate::new(429)).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    let err = client
        .call_structured("p", &json!({"type": "OBJECT"}), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::CredentialsExhausted {
            credentials: 2,
            attempts: 2
        }
    ));
}

#[tokio::test]
async fn test_missing_candidate_text_rotates_to_next_key() {
    let server = MockServer::start().await;
    mount_for_key(
        &server,
        "key-a",
        ResponseTemplate::new(200).set_body_json(json!({"candidates": []})),
    )
    .await;
    mount_for_key(&server, "key-b", ok_text(r#"{"ok": true}"#)).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    let value = client
        .call_structured("p", &json!({"type": "OBJECT"}), None)
        .await
        .unwrap();

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(keys_used(&server).await, vec!["key-a", "key-b"]);
    assert_eq!(client.stats().cursor, 1);
}

#[tokio::test]
async fn test_rule_synthesis_through_rotating_client() {
    let server = MockServer::start().await;
    let generated = json!({
        "name": "bulk_discount",
        "condition": "ctx.get('quantity', 0) >= 10",
        "action_message": "Apply 10% discount to {quantity} items",
        "description": "Large orders get a discount"
    });
    mount_for_key(&server, "key-a", ResponseTemplate::new(429)).await;
    mount_for_key(&server, "key-b", ok_text(&generated.to_string())).await;
    let client = client_for(&server, &["key-a", "key-b"]);

    let rules = RuleSynthesizer::new(&client)
        .generate_rules(["10% off for 10 or more items"])
        .await;
    assert_eq!(rules.len(), 1);

    let mut engine = LogicEngine::new();
    engine.extend(rules);
    let context: Context = json!({"quantity": 12}).as_object().cloned().unwrap();

    assert_eq!(
        engine.evaluate(&context),
        vec!["bulk_discount: Apply 10% discount to 12 items"]
    );
    assert_eq!(client.stats().error_counts, vec![1, 0]);
}

#[tokio::test]
async fn test_rule_synthesis_rejects_unsafe_condition() {
    let server = MockServer::start().await;
    let generated = json!({
        "name": "shell",
        "condition": "__import__('os').system('rm -rf /')",
        "action_message": "boom"
    });
    mount_for_key(&server, "key-a", ok_text(&generated.to_string())).await;
    let client = client_for(&server, &["key-a"]);

    let rule = RuleSynthesizer::new(&client)
        .generate_rule("run a shell command")
        .await;

    assert!(rule.is_none());
}
