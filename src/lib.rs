//! Core library for linerelay. This module wires together the webhook
//! pipeline: raw-body capture, signature verification, envelope parsing
//! and dispatch into the response orchestrator, plus the HTTP handlers
//! and the outcome-to-status mapping.

mod config;
pub mod clients;
pub mod gate;
pub mod relay;
pub mod signature;
pub mod util;

pub use config::AppConfig;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use thiserror::Error;

use crate::clients::{CompletionClient, LineClient, MessagingClient, OpenAiClient};
use crate::gate::RelevanceGate;
use crate::relay::{Disposition, Relay};
use crate::signature::verify_signature;

/// Structures representing the envelope delivered by the LINE platform.
/// Only fields necessary for dispatch are captured here; unknown fields
/// are ignored. See the official webhook documentation for the complete
/// schema.

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type", default)]
    pub event_type: String,
    pub reply_token: Option<String>,
    pub message: Option<MessageContent>,
    pub source: Option<EventSource>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MessageContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Missing text is treated as an empty message rather than an error.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    pub user_id: Option<String>,
}

impl Event {
    /// Reply token and body for a text-message event; `None` for anything
    /// the relay does not answer (other event types, non-text messages,
    /// events without a usable reply token).
    pub fn text_message(&self) -> Option<(&str, &str)> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        let token = self.reply_token.as_deref().filter(|t| !t.is_empty())?;
        Some((token, message.text.as_str()))
    }
}

/// Undecodable input, as opposed to a valid envelope with zero events.
/// The two respond differently: a parse failure is a client error, an
/// empty event list is a benign no-op.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("body is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("body is not a webhook envelope: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub fn parse_envelope(raw: &[u8]) -> Result<WebhookEnvelope, ParseError> {
    let text = std::str::from_utf8(raw)?;
    Ok(serde_json::from_str(text)?)
}

/// Terminal outcome of one webhook request, decided by the pipeline
/// stages in order. Kept separate from the handlers so the
/// (stage, failure-kind) -> status contract is one testable mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Signature header absent, undecodable or mismatched.
    SignatureRejected,
    /// Authenticated body that does not decode into an envelope.
    Malformed,
    /// Valid envelope with no events; acknowledged without work.
    Acknowledged,
    /// First event was handed to the orchestrator.
    Dispatched(Disposition),
}

/// Map an outcome to its HTTP status. Once a signed payload is accepted,
/// every outcome must report success: the platform retries non-2xx
/// responses with the same signed body, which would re-trigger model
/// calls and duplicate replies. Only request-shape failures, all of which
/// precede any side-effecting call, may be non-2xx.
pub fn status_for(outcome: WebhookOutcome) -> StatusCode {
    match outcome {
        WebhookOutcome::SignatureRejected => StatusCode::UNAUTHORIZED,
        WebhookOutcome::Malformed => StatusCode::BAD_REQUEST,
        WebhookOutcome::Acknowledged | WebhookOutcome::Dispatched(_) => StatusCode::OK,
    }
}

/// Internal application state shared across handlers. All entities built
/// from it live for a single request; the state itself is read-only after
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub channel_secret: String,
    /// Maximum accepted raw request body size in bytes (None => unlimited)
    pub max_request_bytes: Option<usize>,
    pub relay: Arc<Relay>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("channel_secret", &"<redacted>")
            .field("max_request_bytes", &self.max_request_bytes)
            .field("relay", &"<relay>")
            .finish()
    }
}

/// Build state from environment variables via [`AppConfig::from_env`].
pub fn build_state_from_env() -> anyhow::Result<AppState> {
    let cfg = AppConfig::from_env()?;
    Ok(build_state(&cfg))
}

/// Wire the production clients. The gate shares the completion client with
/// answer generation; tests inject their own trait objects instead.
pub fn build_state(cfg: &AppConfig) -> AppState {
    let completion: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(cfg));
    let messaging: Arc<dyn MessagingClient> = Arc::new(LineClient::new(cfg));
    let gate = cfg
        .gate_enabled
        .then(|| RelevanceGate::new(completion.clone(), cfg.gate_threshold));
    AppState {
        channel_secret: cfg.line_channel_secret.clone(),
        max_request_bytes: cfg.max_request_bytes,
        relay: Arc::new(Relay::new(gate, completion, messaging)),
    }
}

/// Build the axum router and attach handlers. The router holds a copy of
/// the `AppState` for each invocation.
pub fn app(state: AppState) -> Router {
    let max_request_bytes = state.max_request_bytes;

    let router = Router::new()
        // GET doubles as the platform's liveness probe; it never reads a body.
        .route("/webhook", post(webhook_handler).get(alive_handler))
        .route("/healthz", get(healthz_handler));

    let router = if let Some(limit) = max_request_bytes {
        router.layer(DefaultBodyLimit::max(limit))
    } else {
        router
    };

    router.with_state(state)
}

/// Handler for `POST /webhook`. Captures the raw body exactly once and
/// runs the pipeline: verify -> parse -> dispatch. Signature verification
/// consumes the bytes as received; decoding first and re-serializing
/// would change the byte layout and invalidate the digest.
async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&state.channel_secret, &body, signature) {
        tracing::warn!(
            signature_present = signature.is_some(),
            "rejecting unverified webhook delivery"
        );
        return respond(WebhookOutcome::SignatureRejected);
    }

    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(error = %err, "rejecting undecodable webhook body");
            return respond(WebhookOutcome::Malformed);
        }
    };

    let outcome = match state.relay.dispatch(&envelope).await {
        Some(disposition) => {
            tracing::info!(?disposition, "event dispatched");
            WebhookOutcome::Dispatched(disposition)
        }
        None => {
            tracing::debug!("empty envelope acknowledged");
            WebhookOutcome::Acknowledged
        }
    };
    respond(outcome)
}

fn respond(outcome: WebhookOutcome) -> axum::response::Response {
    let body = match outcome {
        WebhookOutcome::SignatureRejected => "invalid signature",
        WebhookOutcome::Malformed => "bad request",
        WebhookOutcome::Acknowledged | WebhookOutcome::Dispatched(_) => "OK",
    };
    (status_for(outcome), body).into_response()
}

/// Static liveness affordance on the webhook path itself.
async fn alive_handler() -> &'static str {
    "OK"
}

/// Simple health endpoint for container readiness / liveness checks.
async fn healthz_handler() -> axum::response::Response {
    let json = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(json)).into_response()
}
