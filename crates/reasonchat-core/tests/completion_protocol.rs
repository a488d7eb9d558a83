use std::sync::atomic::{AtomicUsize, Ordering};

use reasonchat_core::{
    Completer, CompletionClient, CompletionError, ContentPart, Message, Phase,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers the n-th request with the n-th template, then 500s
struct Sequence {
    responses: Vec<ResponseTemplate>,
    next: AtomicUsize,
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(i)
            .cloned()
            .unwrap_or_else(|| ResponseTemplate::new(500))
    }
}

async fn backend(responses: Vec<ResponseTemplate>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(Sequence {
            responses,
            next: AtomicUsize::new(0),
        })
        .mount(&server)
        .await;
    server
}

fn client(server: &MockServer) -> CompletionClient {
    CompletionClient::new(
        Some("test-key"),
        &format!("{}/api/v1", server.uri()),
        "test-model",
    )
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn reply(content: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

fn hi() -> Vec<Message> {
    vec![Message::user(vec![ContentPart::text("Hi")]).unwrap()]
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_reasoning_round_trips_into_continuation() {
    let server = backend(vec![
        ok(json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Hello" },
                "reasoning_details": "R1"
            }]
        })),
        ok(reply("Hello, how can I help?")),
    ])
    .await;

    let answer = client(&server).complete(&hi()).await.unwrap();
    assert_eq!(answer, "Hello, how can I help?");

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);

    let user = json!({ "role": "user", "content": [{ "type": "text", "text": "Hi" }] });
    assert_eq!(bodies[0]["model"], "test-model");
    assert_eq!(bodies[0]["reasoning"], json!({ "enabled": true }));
    assert_eq!(bodies[0]["messages"], json!([user.clone()]));

    assert_eq!(bodies[1]["reasoning"], json!({ "enabled": true }));
    assert_eq!(
        bodies[1]["messages"],
        json!([
            user,
            { "role": "assistant", "content": "Hello", "reasoning_details": "R1" }
        ])
    );
}

#[tokio::test]
async fn test_nested_reasoning_payload_is_forwarded_verbatim() {
    let payload = json!([
        { "type": "reasoning.encrypted", "data": "gAAAAB...", "id": "rs_1", "index": 0 },
        { "type": "reasoning.summary", "summary": "Greeting", "format": "unknown", "index": 1 }
    ]);
    let server = backend(vec![
        ok(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Hello",
                    "reasoning_details": payload.clone()
                }
            }]
        })),
        ok(reply("Hi there")),
    ])
    .await;

    client(&server).complete(&hi()).await.unwrap();

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[1]["messages"][1]["reasoning_details"], payload);
}

#[tokio::test]
async fn test_absent_reasoning_is_forwarded_as_null() {
    let server = backend(vec![ok(reply("Hello")), ok(reply("Hello again"))]).await;

    let answer = client(&server).complete(&hi()).await.unwrap();
    assert_eq!(answer, "Hello again");

    let bodies = request_bodies(&server).await;
    let continuation = bodies[1]["messages"][1].as_object().unwrap();
    assert_eq!(continuation.get("reasoning_details"), Some(&Value::Null));
    assert_eq!(continuation.get("content"), Some(&json!("Hello")));
}

#[tokio::test]
async fn test_null_reply_content_is_replayed_as_null() {
    let server = backend(vec![
        ok(json!({
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "reasoning_details": "R1"
            }]
        })),
        ok(reply("Here you go")),
    ])
    .await;

    let answer = client(&server).complete(&hi()).await.unwrap();
    assert_eq!(answer, "Here you go");

    let bodies = request_bodies(&server).await;
    assert_eq!(
        bodies[1]["messages"][1],
        json!({ "role": "assistant", "content": null, "reasoning_details": "R1" })
    );
}

#[tokio::test]
async fn test_structured_reply_content_is_replayed_verbatim() {
    let parts = json!([
        { "type": "text", "text": "Hello" },
        { "type": "text", "text": ", there" }
    ]);
    let server = backend(vec![
        ok(json!({ "choices": [{ "message": { "role": "assistant", "content": parts.clone() } }] })),
        ok(json!({ "choices": [{ "message": { "role": "assistant", "content": parts.clone() } }] })),
    ])
    .await;

    let answer = client(&server).complete(&hi()).await.unwrap();
    assert_eq!(answer, "Hello, there");

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[1]["messages"][1]["content"], parts);
}

#[tokio::test]
async fn test_empty_initial_response_skips_continuation() {
    let server = backend(vec![ok(json!({ "choices": [] })), ok(reply("unused"))]).await;

    let err = client(&server).complete(&hi()).await.unwrap_err();
    assert!(matches!(
        err,
        CompletionError::EmptyResponse {
            phase: Phase::Initial
        }
    ));
    assert_eq!(request_bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn test_missing_choices_field_is_empty_response() {
    let server = backend(vec![ok(json!({ "id": "gen-1" }))]).await;

    let err = client(&server).complete(&hi()).await.unwrap_err();
    assert!(matches!(err, CompletionError::EmptyResponse { .. }));
}

#[tokio::test]
async fn test_initial_http_error_reports_phase_and_status() {
    let server = backend(vec![ResponseTemplate::new(500).set_body_string("boom")]).await;

    let err = client(&server).complete(&hi()).await.unwrap_err();
    match err {
        CompletionError::Upstream {
            phase,
            status,
            body,
        } => {
            assert_eq!(phase, Phase::Initial);
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(request_bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn test_continuation_http_error_fails_whole_exchange() {
    let server = backend(vec![
        ok(reply("Hello")),
        ResponseTemplate::new(429).set_body_string("rate limited"),
    ])
    .await;

    let err = client(&server).complete(&hi()).await.unwrap_err();
    assert_eq!(err.phase(), Phase::Continuation);
    assert!(matches!(err, CompletionError::Upstream { status: 429, .. }));
}

#[tokio::test]
async fn test_empty_continuation_response() {
    let server = backend(vec![ok(reply("Hello")), ok(json!({ "choices": [] }))]).await;

    let err = client(&server).complete(&hi()).await.unwrap_err();
    assert!(matches!(
        err,
        CompletionError::EmptyResponse {
            phase: Phase::Continuation
        }
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    // Nothing listens on port 1
    let client = CompletionClient::new(None, "http://127.0.0.1:1/api/v1", "test-model");
    let err = client.complete(&hi()).await.unwrap_err();
    assert!(matches!(
        err,
        CompletionError::Transport {
            phase: Phase::Initial,
            ..
        }
    ));
}
