//! Outbound client boundaries.
//!
//! The relay talks to exactly two external collaborators: a completion
//! service that turns a prompt into text, and the LINE messaging API that
//! delivers text back to the user. Both sit behind object-safe traits so
//! the orchestrator and the tests never depend on the concrete transport.

pub mod line;
pub mod openai;

pub use line::LineClient;
pub use openai::OpenAiClient;

/// A completion service: prompt in, generated text out. Model selection,
/// token limits and API auth are the implementation's concern.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// The messaging platform's push API. `reply` consumes a short-lived reply
/// token scoped to one inbound message; `push` addresses a user directly.
#[async_trait::async_trait]
pub trait MessagingClient: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> anyhow::Result<()>;
    async fn push(&self, user_id: &str, text: &str) -> anyhow::Result<()>;
}
