use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single turn in the conversation sent to the completion API.
///
/// The role is the enum tag, so only `system`, `assistant` and `user` can
/// ever reach the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, name: Option<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            name,
        }
    }

    pub fn user(content: impl Into<String>, name: Option<String>) -> Self {
        Self::User {
            content: content.into(),
            name,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Assistant { .. } => "assistant",
            Self::User { .. } => "user",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::Assistant { content, .. }
            | Self::User { content, .. } => content,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::System { .. } => None,
            Self::Assistant { name, .. } | Self::User { name, .. } => name.as_deref(),
        }
    }
}

/// Request to a completion provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

/// Response from a completion provider.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Text of the first choice.
    pub content: String,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub stop_reason: String,
}

/// Common interface for chat-completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a single request and wait for the full response. No retries.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Completion returned no usable content")]
    EmptyResponse,
}
