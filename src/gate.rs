//! Relevance gate.
//!
//! A cheap classification call decides whether a user message is in scope
//! before the relay spends a full generation call on it. The gate is
//! deliberately infallible: every failure mode (client error, non-JSON
//! output, malformed fields) degrades to a conservative "not related"
//! verdict, so a flaky classifier can never take the webhook down.

use std::sync::Arc;

use crate::clients::CompletionClient;
use crate::util::extract_json_object;

/// Classification result, normalized so `score` is always within `[0,1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub related: bool,
    pub score: f64,
    pub reason: String,
}

impl Verdict {
    fn conservative(reason: impl Into<String>) -> Self {
        Self {
            related: false,
            score: 0.0,
            reason: reason.into(),
        }
    }
}

pub struct RelevanceGate {
    client: Arc<dyn CompletionClient>,
    threshold: f64,
}

impl RelevanceGate {
    pub fn new(client: Arc<dyn CompletionClient>, threshold: f64) -> Self {
        Self { client, threshold }
    }

    /// Classify `text`. Never fails; see module docs for the degradation
    /// policy.
    pub async fn classify(&self, text: &str) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::conservative("empty input");
        }

        let prompt = build_prompt(text);
        let raw = match self.client.generate(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "classification call failed");
                return Verdict::conservative(format!("classification call failed: {err:#}"));
            }
        };

        parse_verdict(&raw)
    }

    /// Threshold decision: the event is in scope only when the model says
    /// related AND the score clears the configured bar.
    pub fn passes(&self, verdict: &Verdict) -> bool {
        verdict.related && verdict.score >= self.threshold
    }
}

fn build_prompt(text: &str) -> String {
    format!(
        "Decide whether the user message below is something this assistant should answer.\n\
         Respond with a single JSON object and nothing else, exactly of the form\n\
         {{\"related\": true|false, \"score\": <number from 0 to 1>, \"reason\": \"<short statement>\"}}.\n\
         The reason must be a declarative statement, never a question.\n\
         User message:\n{text}"
    )
}

/// Extract and normalize a verdict from raw model output. Models wrap JSON
/// in prose despite instructions, so the first balanced object span is what
/// gets decoded.
fn parse_verdict(raw: &str) -> Verdict {
    let Some(span) = extract_json_object(raw) else {
        return Verdict::conservative("parse error or non-json response");
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(span) else {
        return Verdict::conservative("parse error or non-json response");
    };

    let related = value
        .get("related")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    // Out-of-range, non-finite and non-numeric scores all zero out; the
    // invariant is that a kept score was already inside [0,1].
    let score = value
        .get("score")
        .and_then(serde_json::Value::as_f64)
        .filter(|s| s.is_finite() && (0.0..=1.0).contains(s))
        .unwrap_or(0.0);
    let reason = value
        .get("reason")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string();

    Verdict {
        related,
        score,
        reason,
    }
}
