//! Response orchestration.
//!
//! Drives the per-event workflow: gate, generate, deliver. Failures past
//! the transport boundary never unwind out of here; they are converted
//! into fallback text by `reply_text_for` and reported through the
//! `Disposition` enum. The webhook's outward contract is "processing
//! completed" regardless of whether the user saw model output or a
//! fallback.

use std::sync::Arc;

use crate::clients::{CompletionClient, MessagingClient};
use crate::gate::RelevanceGate;
use crate::{Event, WebhookEnvelope};

/// Delivered when the gate decides a message is out of scope.
pub const REDIRECT_TEXT: &str =
    "Sorry, that is outside what this assistant can help with. Please ask about our service.";

/// Delivered when generation fails or produces nothing.
pub const FALLBACK_TEXT: &str =
    "Sorry, I could not prepare an answer right now. Please try again in a moment.";

/// How the orchestrator disposed of one event. Informational only; every
/// variant maps to a success status at the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Generated answer delivered.
    Replied,
    /// Fallback text delivered in place of a failed or empty generation.
    RepliedFallback,
    /// Gate verdict below threshold; redirect text delivered, no
    /// generation call made.
    Redirected,
    /// Outbound delivery failed; logged and absorbed.
    DeliveryFailed,
    /// Non-text event or missing reply token; nothing to do.
    Skipped,
}

pub struct Relay {
    gate: Option<RelevanceGate>,
    completion: Arc<dyn CompletionClient>,
    messaging: Arc<dyn MessagingClient>,
}

impl Relay {
    pub fn new(
        gate: Option<RelevanceGate>,
        completion: Arc<dyn CompletionClient>,
        messaging: Arc<dyn MessagingClient>,
    ) -> Self {
        Self {
            gate,
            completion,
            messaging,
        }
    }

    /// Process the first event of an envelope. Trailing events are skipped
    /// by design; platform fan-out has not been observed to batch more
    /// than one event per delivery.
    pub async fn dispatch(&self, envelope: &WebhookEnvelope) -> Option<Disposition> {
        let event = envelope.events.first()?;
        if envelope.events.len() > 1 {
            tracing::info!(
                ignored = envelope.events.len() - 1,
                "processing first event only"
            );
        }
        Some(self.handle_event(event).await)
    }

    pub async fn handle_event(&self, event: &Event) -> Disposition {
        let Some((reply_token, text)) = event.text_message() else {
            tracing::info!(event_type = %event.event_type, "skipping non-text event");
            return Disposition::Skipped;
        };

        if let Some(gate) = &self.gate {
            let verdict = gate.classify(text).await;
            if !gate.passes(&verdict) {
                tracing::info!(
                    related = verdict.related,
                    score = verdict.score,
                    reason = %verdict.reason,
                    "message gated out, sending redirect"
                );
                return self
                    .deliver(reply_token, REDIRECT_TEXT, Disposition::Redirected)
                    .await;
            }
            tracing::debug!(score = verdict.score, "gate passed");
        }

        let (text, fell_back) = reply_text_for(self.completion.generate(text).await);
        let disposition = if fell_back {
            Disposition::RepliedFallback
        } else {
            Disposition::Replied
        };
        self.deliver(reply_token, &text, disposition).await
    }

    async fn deliver(&self, reply_token: &str, text: &str, outcome: Disposition) -> Disposition {
        match self.messaging.reply(reply_token, text).await {
            Ok(()) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "reply delivery failed");
                Disposition::DeliveryFailed
            }
        }
    }
}

/// The single place where generation failures become user-visible text.
/// Returns the reply body and whether it is a fallback.
fn reply_text_for(answer: anyhow::Result<String>) -> (String, bool) {
    match answer {
        Ok(text) if !text.trim().is_empty() => (text, false),
        Ok(_) => {
            tracing::warn!("generation returned empty answer, using fallback");
            (FALLBACK_TEXT.to_string(), true)
        }
        Err(err) => {
            tracing::warn!(error = %err, "generation failed, using fallback");
            (FALLBACK_TEXT.to_string(), true)
        }
    }
}
