use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info};

use snark_agent::reply::ReplyOutcome;
use snark_agent::{HandleOutcome, Relay};

use crate::surface::{to_inbound, DiscordHistory, DiscordReply};

/// Serenity event handler wired to the relay pipeline.
pub struct RelayHandler {
    pub relay: Arc<Relay>,
    pub bot_id: OnceLock<UserId>,
}

impl RelayHandler {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            bot_id: OnceLock::new(),
        }
    }
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(
            name = %ready.user.name,
            guilds = ready.guilds.len(),
            "Discord bot is online and ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Events before READY have nothing to compare authors against.
        let Some(bot_id) = self.bot_id.get().copied() else {
            return;
        };

        let inbound = to_inbound(&msg);
        let history = DiscordHistory::new(Arc::clone(&ctx.http), msg.channel_id);
        let surface = Arc::new(DiscordReply::new(
            Arc::clone(&ctx.http),
            msg.channel_id,
            msg.id,
        ));

        match self
            .relay
            .handle(&inbound, bot_id.get(), &history, surface)
            .await
        {
            HandleOutcome::Ignored(_) => {}
            HandleOutcome::Replied(ReplyOutcome::Answered {
                chars,
                truncated,
                stop_reason,
            }) => {
                debug!(
                    channel_id = %msg.channel_id,
                    chars,
                    truncated,
                    %stop_reason,
                    "reply delivered"
                );
            }
            HandleOutcome::Replied(ReplyOutcome::Failed { .. }) => {
                // The deletion timer keeps running after being dropped.
                debug!(channel_id = %msg.channel_id, "error notice posted");
            }
            HandleOutcome::Replied(ReplyOutcome::PlaceholderFailed) => {
                debug!(channel_id = %msg.channel_id, "could not post placeholder");
            }
        }
    }
}
