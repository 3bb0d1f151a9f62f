use std::sync::Arc;

use snark_core::RelayConfig;
use tracing::{debug, info};

use crate::context::{ChannelHistory, ContextBuilder, HistoryMessage, HISTORY_WINDOW};
use crate::filter::{FilterDecision, InboundMessage, MessageFilter, RejectReason};
use crate::provider::LlmProvider;
use crate::reply::{ReplyLifecycle, ReplyOutcome, ReplySurface};
use crate::report::ErrorReporter;

/// The whole per-message pipeline, shared read-only across events.
pub struct Relay {
    filter: MessageFilter,
    context: ContextBuilder,
    lifecycle: ReplyLifecycle,
    reporter: Arc<dyn ErrorReporter>,
}

#[derive(Debug)]
pub enum HandleOutcome {
    Ignored(RejectReason),
    Replied(ReplyOutcome),
}

impl Relay {
    pub fn new(
        config: &RelayConfig,
        provider: Arc<dyn LlmProvider>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let lifecycle = ReplyLifecycle::new(
            provider,
            Arc::clone(&reporter),
            config.openai_model.clone(),
            config.max_tokens,
        );
        Self::from_parts(
            MessageFilter::from_config(config),
            ContextBuilder::from_config(config),
            lifecycle,
            reporter,
        )
    }

    pub fn from_parts(
        filter: MessageFilter,
        context: ContextBuilder,
        lifecycle: ReplyLifecycle,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            filter,
            context,
            lifecycle,
            reporter,
        }
    }

    /// Run filter → context → reply for one inbound message.
    ///
    /// `relay_id` is the bot's own user id on the platform.
    pub async fn handle<H, S>(
        &self,
        msg: &InboundMessage,
        relay_id: u64,
        history: &H,
        surface: Arc<S>,
    ) -> HandleOutcome
    where
        H: ChannelHistory,
        S: ReplySurface,
    {
        if let FilterDecision::Reject(reason) = self.filter.evaluate(msg) {
            debug!(
                channel_id = msg.channel_id,
                author_id = msg.author_id,
                reason = reason.as_str(),
                "message ignored"
            );
            return HandleOutcome::Ignored(reason);
        }

        let window = match history.recent(HISTORY_WINDOW).await {
            Ok(window) => window,
            Err(e) => {
                self.reporter.report("fetch_history", &e);
                vec![HistoryMessage::from(msg)]
            }
        };

        let turns = self.context.build(window, relay_id, msg.author_id);
        info!(
            channel_id = msg.channel_id,
            author = %msg.author_name,
            turns = turns.len(),
            "relaying message"
        );

        HandleOutcome::Replied(self.lifecycle.run(surface, turns).await)
    }
}
