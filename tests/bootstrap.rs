//! Startup wiring tests: state built from environment variables serves
//! the liveness endpoints, and missing credentials refuse to start.

#[path = "common/mod.rs"]
mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::EnvGuard;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tower::ServiceExt; // for oneshot

use linerelay::{app, build_state_from_env};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn set_required(env: &mut EnvGuard) {
    env.set("LINE_CHANNEL_SECRET", "channel-secret");
    env.set("LINE_CHANNEL_ACCESS_TOKEN", "access-token");
    env.set("OPENAI_API_KEY", "sk-test");
}

#[tokio::test]
async fn env_built_state_serves_liveness_endpoints() {
    let _lock = ENV_MUTEX.lock().await;
    let mut env = EnvGuard::new();
    set_required(&mut env);
    env.remove("RELAY_MAX_REQUEST_BYTES");

    let state = build_state_from_env().unwrap();
    let app = app(state);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/webhook")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn missing_credentials_refuse_startup() {
    let _lock = ENV_MUTEX.lock().await;
    let mut env = EnvGuard::new();
    set_required(&mut env);
    env.remove("OPENAI_API_KEY");

    let err = build_state_from_env().unwrap_err();
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}
