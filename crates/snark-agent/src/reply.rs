//! Placeholder → completion → edit reply lifecycle.
//!
//! A loading placeholder goes out before the completion call so the user gets
//! immediate feedback. It is then edited in place with the answer, or with a
//! static error notice that deletes itself after [`ERROR_DELETE_AFTER`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::provider::{ChatMessage, ChatRequest, LlmProvider};
use crate::report::ErrorReporter;

/// Hard per-message character limit on Discord.
pub const MESSAGE_LIMIT: usize = 2000;
const ELLIPSIS: &str = "...";

pub const LOADING_TEXT: &str =
    "<a:loading:1095759091869167747> Generating a response, please wait...";
pub const ERROR_TEXT: &str =
    "<:xmark:1055230112934674513> There was an error processing your request. Please try again later.";
pub const ERROR_DELETE_AFTER: Duration = Duration::from_secs(5);

/// Outbound message operations the lifecycle needs from a platform.
#[async_trait]
pub trait ReplySurface: Send + Sync + 'static {
    /// Identifies a posted message for later edit/delete.
    type Handle: Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Post `text` as a reply to the triggering message.
    async fn post_reply(&self, text: &str) -> Result<Self::Handle, Self::Error>;

    async fn edit(&self, handle: &Self::Handle, text: &str) -> Result<(), Self::Error>;

    async fn delete(&self, handle: &Self::Handle) -> Result<(), Self::Error>;
}

/// The provisional reply. Only the lifecycle holds one.
#[derive(Debug)]
pub struct Placeholder<H> {
    handle: H,
}

impl<H> Placeholder<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }
}

/// Scheduled deletion of an error notice.
///
/// Dropping the timer leaves the deletion scheduled; call [`cancel`](Self::cancel)
/// to abort it.
#[derive(Debug)]
pub struct DeletionTimer {
    task: JoinHandle<()>,
    deadline: Instant,
}

impl DeletionTimer {
    /// Delete `placeholder` from `surface` once `delay` has elapsed.
    pub fn schedule<S: ReplySurface>(
        surface: Arc<S>,
        placeholder: Placeholder<S::Handle>,
        delay: Duration,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let deadline = Instant::now() + delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            match surface.delete(&placeholder.handle).await {
                Ok(()) => debug!("error notice deleted"),
                Err(e) => reporter.report("delete_reply", &e),
            }
        });
        Self { task, deadline }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        self.task.abort();
    }

    /// Wait until the deletion has run (or was cancelled).
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// What happened to a single reply.
#[derive(Debug)]
pub enum ReplyOutcome {
    /// The placeholder now shows the completion text.
    Answered {
        chars: usize,
        truncated: bool,
        /// Provider's finish reason, e.g. `"stop"` or `"length"`.
        stop_reason: String,
    },
    /// The placeholder shows the error notice and will be deleted.
    Failed { deletion: DeletionTimer },
    /// The placeholder could not be posted; nothing was sent to the model.
    PlaceholderFailed,
}

pub struct ReplyLifecycle {
    provider: Arc<dyn LlmProvider>,
    reporter: Arc<dyn ErrorReporter>,
    model: String,
    max_tokens: u32,
    delete_after: Duration,
}

impl ReplyLifecycle {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        reporter: Arc<dyn ErrorReporter>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            reporter,
            model: model.into(),
            max_tokens,
            delete_after: ERROR_DELETE_AFTER,
        }
    }

    pub fn with_delete_after(mut self, delay: Duration) -> Self {
        self.delete_after = delay;
        self
    }

    /// Post a placeholder, run one completion, and finalise the reply.
    pub async fn run<S: ReplySurface>(
        &self,
        surface: Arc<S>,
        messages: Vec<ChatMessage>,
    ) -> ReplyOutcome {
        let placeholder = match surface.post_reply(LOADING_TEXT).await {
            Ok(handle) => Placeholder { handle },
            Err(e) => {
                self.reporter.report("post_placeholder", &e);
                return ReplyOutcome::PlaceholderFailed;
            }
        };

        let req = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
        };

        match self.provider.send(&req).await {
            Ok(resp) => {
                let (text, truncated) = truncate_reply(&resp.content);
                let chars = text.chars().count();
                info!(
                    provider = self.provider.name(),
                    model = %resp.model,
                    tokens_in = resp.tokens_in,
                    tokens_out = resp.tokens_out,
                    stop_reason = %resp.stop_reason,
                    chars,
                    truncated,
                    "completion received"
                );
                if let Err(e) = surface.edit(&placeholder.handle, &text).await {
                    self.reporter.report("edit_reply", &e);
                }
                ReplyOutcome::Answered {
                    chars,
                    truncated,
                    stop_reason: resp.stop_reason,
                }
            }
            Err(e) => {
                self.reporter.report("completion", &e);
                if let Err(edit_err) = surface.edit(&placeholder.handle, ERROR_TEXT).await {
                    self.reporter.report("edit_reply", &edit_err);
                }
                let deletion = DeletionTimer::schedule(
                    surface,
                    placeholder,
                    self.delete_after,
                    Arc::clone(&self.reporter),
                );
                ReplyOutcome::Failed { deletion }
            }
        }
    }
}

/// Fit `text` into one platform message.
///
/// Longer text is cut to `MESSAGE_LIMIT - 3` chars plus `...`. Counts chars,
/// never splits one.
pub fn truncate_reply(text: &str) -> (String, bool) {
    match text.char_indices().nth(MESSAGE_LIMIT) {
        None => (text.to_string(), false),
        Some(_) => {
            let keep = MESSAGE_LIMIT - ELLIPSIS.len();
            let cut = text
                .char_indices()
                .nth(keep)
                .map(|(i, _)| i)
                .unwrap_or(text.len());
            (format!("{}{}", &text[..cut], ELLIPSIS), true)
        }
    }
}
