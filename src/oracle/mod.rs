//! The oracle interface: an abstraction over an LLM offering one call,
//! `chat`, with the option knobs an LLM-backed agent needs (logit
//! bias, log-probabilities, stop sequences, …).

mod openai;
mod stub;
mod tokens;

pub use openai::OpenAiOracle;
pub use stub::StubOracle;
pub use tokens::TokenTable;

use std::collections::HashMap;

use async_trait::async_trait;

/// A chat message role, as accepted by the oracle (only `system` and
/// `user` are ever sent by this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A numeric token identifier in the oracle's own tokenizer space.
pub type TokenId = u32;

/// Chat completion options.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub n: u32,
    pub stop: Vec<String>,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub logit_bias: HashMap<TokenId, f32>,
    pub logprobs: bool,
    pub top_logprobs: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        ChatOptions {
            max_tokens: 256,
            temperature: 1.0,
            n: 1,
            stop: Vec::new(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            logit_bias: HashMap::new(),
            logprobs: false,
            top_logprobs: 0,
        }
    }
}

/// One alternative token considered at a position, with its
/// log-probability.
#[derive(Debug, Clone)]
pub struct TopLogprob {
    pub token: String,
    pub logprob: f32,
}

/// Per-token log-probability information for one emitted token.
#[derive(Debug, Clone)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f32,
    pub top_logprobs: Vec<TopLogprob>,
}

/// One completion choice.
#[derive(Debug, Clone)]
pub struct Choice {
    pub message: ChatMessage,
    pub logprobs: Option<Vec<TokenLogprob>>,
}

/// Failures from the oracle layer. The core treats any of these as
/// the entire call having failed; it is the agent's job (not the
/// oracle's) to retry up to `MAX_LLM_TRIES`.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned a malformed response: {0}")]
    MalformedResponse(String),
    #[error("oracle returned no choices")]
    NoChoices,
    #[error("missing configuration: {0}")]
    Configuration(String),
}

/// Abstracts an LLM behind a single `chat` call. Concrete
/// implementations: [`OpenAiOracle`] (real HTTP) and [`StubOracle`]
/// (deterministic, used by tests).
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Vec<Choice>, OracleError>;

    /// The token-id table for the literal tokens this crate needs to
    /// bias/inspect (`white`, `black`, `yes`, `no`), specific to this
    /// oracle's tokenizer.
    fn token_table(&self) -> &TokenTable;
}
