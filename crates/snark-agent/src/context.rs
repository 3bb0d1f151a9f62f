//! Conversation window assembly.
//!
//! Turns the last few channel messages into the role-tagged turn list sent to
//! the completion API: one system persona turn, then history oldest-first.

use async_trait::async_trait;
use snark_core::{ForeignUserPolicy, RelayConfig};

use crate::filter::{has_ignore_prefix, InboundMessage};
use crate::provider::ChatMessage;

/// Number of recent channel messages fetched for each reply.
pub const HISTORY_WINDOW: u8 = 8;

/// Longest `name` the completion API accepts.
const MAX_NAME_LEN: usize = 64;

/// Platform-neutral view of a message fetched from channel history.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub author_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
}

impl From<&InboundMessage> for HistoryMessage {
    fn from(msg: &InboundMessage) -> Self {
        Self {
            author_id: msg.author_id,
            author_name: msg.author_name.clone(),
            author_is_bot: msg.author_is_bot,
            content: msg.content.clone(),
        }
    }
}

/// Read access to a channel's recent messages.
#[async_trait]
pub trait ChannelHistory: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The `limit` most recent messages, newest first.
    async fn recent(&self, limit: u8) -> Result<Vec<HistoryMessage>, Self::Error>;
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    persona: String,
    ignore_prefix: String,
    foreign_users: ForeignUserPolicy,
}

impl ContextBuilder {
    pub fn new(
        persona: impl Into<String>,
        ignore_prefix: impl Into<String>,
        foreign_users: ForeignUserPolicy,
    ) -> Self {
        Self {
            persona: persona.into(),
            ignore_prefix: ignore_prefix.into(),
            foreign_users,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.system_message.clone(),
            config.ignore_message_prefix.clone(),
            config.foreign_users,
        )
    }

    /// Build the turn list from a newest-first history window.
    ///
    /// `relay_id` is the bot's own user id; `requester_id` is the author of the
    /// message being answered.
    pub fn build(
        &self,
        newest_first: Vec<HistoryMessage>,
        relay_id: u64,
        requester_id: u64,
    ) -> Vec<ChatMessage> {
        let mut turns = Vec::with_capacity(newest_first.len() + 1);
        turns.push(ChatMessage::system(self.persona.clone()));

        for msg in newest_first.into_iter().rev() {
            if has_ignore_prefix(&msg.content, &self.ignore_prefix) {
                continue;
            }

            if msg.author_id == relay_id {
                let name = sanitize_name(&msg.author_name);
                turns.push(ChatMessage::assistant(msg.content, name));
            } else if msg.author_is_bot {
                // Some other bot.
                continue;
            } else if msg.author_id == requester_id {
                let name = sanitize_name(&msg.author_name);
                turns.push(ChatMessage::user(msg.content, name));
            } else if self.foreign_users == ForeignUserPolicy::Anonymous {
                turns.push(ChatMessage::user(msg.content, None));
            }
        }

        turns
    }
}

/// Make a display name acceptable as an API `name`.
///
/// Whitespace runs become a single `_`, everything outside `[A-Za-z0-9_]` is
/// dropped, and the result is capped at 64 chars. `None` if nothing is left.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;

    for c in raw.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        }
    }

    // Only ASCII survives, so byte truncation is char-safe.
    out.truncate(MAX_NAME_LEN);
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}
