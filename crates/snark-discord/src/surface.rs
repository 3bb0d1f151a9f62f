//! serenity-backed implementations of the relay's platform seams.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateMessage, EditMessage, GetMessages};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, MessageId};

use snark_agent::context::{ChannelHistory, HistoryMessage};
use snark_agent::filter::InboundMessage;
use snark_agent::reply::ReplySurface;

/// Replies, edits and deletes in one channel, threaded onto the triggering message.
pub struct DiscordReply {
    http: Arc<Http>,
    channel_id: ChannelId,
    reply_to: MessageId,
}

impl DiscordReply {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, reply_to: MessageId) -> Self {
        Self {
            http,
            channel_id,
            reply_to,
        }
    }
}

#[async_trait]
impl ReplySurface for DiscordReply {
    type Handle = MessageId;
    type Error = serenity::Error;

    async fn post_reply(&self, text: &str) -> Result<MessageId, serenity::Error> {
        let builder = reply_builder(self.channel_id, self.reply_to, text);
        let sent = self.channel_id.send_message(&self.http, builder).await?;
        Ok(sent.id)
    }

    async fn edit(&self, handle: &MessageId, text: &str) -> Result<(), serenity::Error> {
        self.channel_id
            .edit_message(&self.http, *handle, EditMessage::new().content(text))
            .await?;
        Ok(())
    }

    async fn delete(&self, handle: &MessageId) -> Result<(), serenity::Error> {
        self.channel_id.delete_message(&self.http, *handle).await
    }
}

/// Recent-history reader for one channel.
pub struct DiscordHistory {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordHistory {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ChannelHistory for DiscordHistory {
    type Error = serenity::Error;

    async fn recent(&self, limit: u8) -> Result<Vec<HistoryMessage>, serenity::Error> {
        // Discord returns newest first.
        let messages = self
            .channel_id
            .messages(&self.http, GetMessages::new().limit(limit))
            .await?;
        Ok(messages.iter().map(to_history).collect())
    }
}

pub(crate) fn reply_builder(channel_id: ChannelId, reply_to: MessageId, text: &str) -> CreateMessage {
    CreateMessage::new()
        .content(text)
        .reference_message((channel_id, reply_to))
}

pub fn to_history(msg: &Message) -> HistoryMessage {
    HistoryMessage {
        author_id: msg.author.id.get(),
        author_name: msg.author.name.clone(),
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
    }
}

pub fn to_inbound(msg: &Message) -> InboundMessage {
    InboundMessage {
        author_id: msg.author.id.get(),
        author_name: msg.author.name.clone(),
        author_is_bot: msg.author.bot,
        channel_id: msg.channel_id.get(),
        content: msg.content.clone(),
    }
}
