//! Error reporting sink.
//!
//! Every failure the relay swallows (completion errors, platform send/edit/delete
//! failures, panics in the binary) ends up here exactly once.

use std::any::Any;
use std::error::Error;
use std::panic::Location;

/// Where swallowed errors go.
pub trait ErrorReporter: Send + Sync {
    /// `stage` is a short static label such as `"completion"` or `"edit_reply"`.
    fn report(&self, stage: &'static str, error: &(dyn Error + 'static));
}

/// Production reporter: one `tracing::error!` event per failure, with the
/// full `source()` chain flattened into a single field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, stage: &'static str, error: &(dyn Error + 'static)) {
        let chain = error_chain(error);
        tracing::error!(stage, error = %chain, "relay error");
    }
}

/// A panic turned into an error so the hook can hand it to an [`ErrorReporter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panicked at {location}: {message}")]
pub struct PanicReport {
    pub message: String,
    pub location: String,
}

impl PanicReport {
    pub fn from_payload(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };
        let location = location
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());
        Self { message, location }
    }
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        out.push_str(": ");
        out.push_str(&err.to_string());
        source = err.source();
    }
    out
}
