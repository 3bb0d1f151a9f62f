use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use snark_agent::Relay;

use crate::error::DiscordError;
use crate::handler::RelayHandler;

/// Gateway intents the relay needs: guild channels, their messages, and
/// message text.
pub fn relay_intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

/// Discord channel adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process exits,
/// rebuilding the client whenever the gateway drops.
pub struct DiscordAdapter {
    relay: Arc<Relay>,
    token: String,
}

impl DiscordAdapter {
    pub fn new(token: &str, relay: Arc<Relay>) -> Result<Self, DiscordError> {
        if token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self {
            relay,
            token: token.to_string(),
        })
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns.
    pub async fn run(self) {
        let intents = relay_intents();
        let mut client = self.connect(intents).await;

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;
            client = self.connect(intents).await;
        }
    }

    /// Build a client, retrying every 30s until it succeeds.
    async fn connect(&self, intents: GatewayIntents) -> Client {
        loop {
            match self.build_client(intents).await {
                Ok(c) => return c,
                Err(e) => {
                    error!("Discord: client build failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, DiscordError> {
        let handler = RelayHandler::new(Arc::clone(&self.relay));
        let client = Client::builder(&self.token, intents)
            .event_handler(handler)
            .await?;
        Ok(client)
    }
}
