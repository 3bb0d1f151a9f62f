//! Inbound message gate.
//!
//! Checks run in a fixed order (bot author, channel allowlist, ignore prefix)
//! and the first failing check decides the reason.

use snark_core::{ChannelAllowlist, RelayConfig};

/// Platform-neutral view of a freshly created channel message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub channel_id: u64,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BotAuthor,
    ChannelNotAllowed,
    IgnorePrefix,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::BotAuthor => "bot_author",
            RejectReason::ChannelNotAllowed => "channel_not_allowed",
            RejectReason::IgnorePrefix => "ignore_prefix",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageFilter {
    allowlist: ChannelAllowlist,
    ignore_prefix: String,
}

impl MessageFilter {
    pub fn new(allowlist: ChannelAllowlist, ignore_prefix: impl Into<String>) -> Self {
        Self {
            allowlist,
            ignore_prefix: ignore_prefix.into(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.channels.clone(), config.ignore_message_prefix.clone())
    }

    pub fn evaluate(&self, msg: &InboundMessage) -> FilterDecision {
        if msg.author_is_bot {
            return FilterDecision::Reject(RejectReason::BotAuthor);
        }
        if !self.allowlist.contains(msg.channel_id) {
            return FilterDecision::Reject(RejectReason::ChannelNotAllowed);
        }
        if has_ignore_prefix(&msg.content, &self.ignore_prefix) {
            return FilterDecision::Reject(RejectReason::IgnorePrefix);
        }
        FilterDecision::Accept
    }
}

/// `true` when `text` starts with a non-empty `prefix`.
///
/// An empty prefix suppresses nothing.
pub fn has_ignore_prefix(text: &str, prefix: &str) -> bool {
    !prefix.is_empty() && text.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> MessageFilter {
        MessageFilter::new([100, 200].into_iter().collect(), "!")
    }

    fn msg(channel_id: u64, content: &str, bot: bool) -> InboundMessage {
        InboundMessage {
            author_id: 7,
            author_name: "alice".into(),
            author_is_bot: bot,
            channel_id,
            content: content.into(),
        }
    }

    #[test]
    fn accepts_plain_message_in_allowed_channel() {
        assert_eq!(filter().evaluate(&msg(100, "hello", false)), FilterDecision::Accept);
        assert_eq!(filter().evaluate(&msg(200, "hi!", false)), FilterDecision::Accept);
    }

    #[test]
    fn bots_are_always_rejected() {
        for (channel, text) in [(100, "hello"), (999, "hello"), (100, "!cmd")] {
            assert_eq!(
                filter().evaluate(&msg(channel, text, true)),
                FilterDecision::Reject(RejectReason::BotAuthor)
            );
        }
    }

    #[test]
    fn unlisted_channel_is_rejected() {
        assert_eq!(
            filter().evaluate(&msg(300, "hello", false)),
            FilterDecision::Reject(RejectReason::ChannelNotAllowed)
        );
    }

    #[test]
    fn ignore_prefix_is_rejected() {
        assert_eq!(
            filter().evaluate(&msg(100, "!play song", false)),
            FilterDecision::Reject(RejectReason::IgnorePrefix)
        );
    }

    #[test]
    fn checks_run_in_order() {
        // Unlisted channel wins over prefix.
        assert_eq!(
            filter().evaluate(&msg(300, "!play", false)),
            FilterDecision::Reject(RejectReason::ChannelNotAllowed)
        );
    }

    #[test]
    fn empty_prefix_suppresses_nothing() {
        let f = MessageFilter::new([100].into_iter().collect(), "");
        assert_eq!(f.evaluate(&msg(100, "anything", false)), FilterDecision::Accept);
        assert!(!has_ignore_prefix("anything", ""));
    }

    #[test]
    fn multi_char_prefix() {
        assert!(has_ignore_prefix("//note to self", "//"));
        assert!(!has_ignore_prefix("/note", "//"));
    }
}
