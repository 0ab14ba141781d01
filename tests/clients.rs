//! Wire-level tests for the outbound clients: each one talks to an
//! in-process axum stand-in for the real API and the test asserts the
//! request shape (path, bearer auth, body fields) the vendor expects.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use linerelay::clients::{CompletionClient, LineClient, MessagingClient, OpenAiClient};
use linerelay::AppConfig;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
}

impl Captured {
    fn take(&self) -> Vec<(String, Option<String>, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    path: &str,
    state: &Captured,
    headers: &HeaderMap,
    body: Value,
) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    state
        .requests
        .lock()
        .unwrap()
        .push((path.to_string(), auth, body));
}

// Stand-in for the chat-completions API; always answers with one choice.
async fn start_mock_openai(answer: &'static str) -> (SocketAddr, Captured, JoinHandle<()>) {
    let captured = Captured::default();
    async fn completions(
        State((captured, answer)): State<(Captured, &'static str)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        record("/v1/chat/completions", &captured, &headers, body).await;
        Json(json!({
            "choices": [ { "message": { "role": "assistant", "content": answer } } ]
        }))
    }
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state((captured.clone(), answer));
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, captured, handle)
}

// Stand-in for the LINE messaging API; accepts reply and push.
async fn start_mock_line() -> (SocketAddr, Captured, JoinHandle<()>) {
    let captured = Captured::default();
    async fn reply(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        record("/v2/bot/message/reply", &captured, &headers, body).await;
        Json(json!({}))
    }
    async fn push(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        record("/v2/bot/message/push", &captured, &headers, body).await;
        Json(json!({}))
    }
    let app = Router::new()
        .route("/v2/bot/message/reply", post(reply))
        .route("/v2/bot/message/push", post(push))
        .with_state(captured.clone());
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, captured, handle)
}

fn test_config(line_base: &str, openai_base: &str) -> AppConfig {
    AppConfig {
        line_channel_secret: "test-secret".to_string(),
        line_channel_access_token: "line-token".to_string(),
        openai_api_key: "sk-test".to_string(),
        model: "gpt-4o-mini".to_string(),
        temperature: 0.7,
        max_tokens: 300,
        gate_enabled: true,
        gate_threshold: 0.6,
        max_request_bytes: None,
        http_timeout_ms: 2_000,
        line_api_base: line_base.to_string(),
        openai_api_base: openai_base.to_string(),
    }
}

#[tokio::test]
async fn openai_client_sends_expected_request_and_reads_answer() {
    let (addr, captured, _handle) = start_mock_openai("hello from the model").await;
    let cfg = test_config("http://unused", &format!("http://{}", addr));
    let client = OpenAiClient::new(&cfg);

    let answer = client.generate("what are your hours?").await.unwrap();
    assert_eq!(answer, "hello from the model");

    let requests = captured.take();
    assert_eq!(requests.len(), 1);
    let (path, auth, body) = &requests[0];
    assert_eq!(path, "/v1/chat/completions");
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], json!("gpt-4o-mini"));
    assert_eq!(body["temperature"], json!(0.7));
    assert_eq!(body["max_tokens"], json!(300));
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], json!("system"));
    assert_eq!(messages[1]["role"], json!("user"));
    assert_eq!(messages[1]["content"], json!("what are your hours?"));
}

#[tokio::test]
async fn openai_client_errors_on_http_failure_status() {
    async fn failing() -> (axum::http::StatusCode, &'static str) {
        (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom")
    }
    let app = Router::new().route("/v1/chat/completions", post(failing));
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let _handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let cfg = test_config("http://unused", &format!("http://{}", addr));
    let client = OpenAiClient::new(&cfg);
    assert!(client.generate("anything").await.is_err());
}

#[tokio::test]
async fn openai_client_errors_on_unreachable_host() {
    // No listener on this port; the client's own timeout/connect error is
    // the only bound, per the resource model.
    let cfg = test_config("http://unused", "http://127.0.0.1:9");
    let client = OpenAiClient::new(&cfg);
    assert!(client.generate("anything").await.is_err());
}

#[tokio::test]
async fn line_client_reply_posts_token_and_text() {
    let (addr, captured, _handle) = start_mock_line().await;
    let cfg = test_config(&format!("http://{}", addr), "http://unused");
    let client = LineClient::new(&cfg);

    client.reply("tok-abc", "the answer").await.unwrap();

    let requests = captured.take();
    assert_eq!(requests.len(), 1);
    let (path, auth, body) = &requests[0];
    assert_eq!(path, "/v2/bot/message/reply");
    assert_eq!(auth.as_deref(), Some("Bearer line-token"));
    assert_eq!(body["replyToken"], json!("tok-abc"));
    assert_eq!(body["messages"][0]["type"], json!("text"));
    assert_eq!(body["messages"][0]["text"], json!("the answer"));
}

#[tokio::test]
async fn line_client_push_addresses_user() {
    let (addr, captured, _handle) = start_mock_line().await;
    let cfg = test_config(&format!("http://{}", addr), "http://unused");
    let client = LineClient::new(&cfg);

    client.push("U123", "proactive note").await.unwrap();

    let requests = captured.take();
    assert_eq!(requests.len(), 1);
    let (path, _auth, body) = &requests[0];
    assert_eq!(path, "/v2/bot/message/push");
    assert_eq!(body["to"], json!("U123"));
    assert_eq!(body["messages"][0]["text"], json!("proactive note"));
}

#[tokio::test]
async fn line_client_errors_on_http_failure_status() {
    async fn failing() -> (axum::http::StatusCode, &'static str) {
        (axum::http::StatusCode::UNAUTHORIZED, "bad token")
    }
    let app = Router::new().route("/v2/bot/message/reply", post(failing));
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let _handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let cfg = test_config(&format!("http://{}", addr), "http://unused");
    let client = LineClient::new(&cfg);
    assert!(client.reply("tok", "text").await.is_err());
}
