// In-memory stand-ins for the platform, the completion API and the error sink.
#![allow(dead_code)]

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use snark_agent::context::{ChannelHistory, HistoryMessage};
use snark_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use snark_agent::reply::ReplySurface;
use snark_agent::report::ErrorReporter;

#[derive(Debug, thiserror::Error)]
#[error("simulated platform failure")]
pub struct PlatformFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Post(String),
    Edit(u64, String),
    Delete(u64),
}

#[derive(Default)]
pub struct FakeSurface {
    ops: Mutex<Vec<Op>>,
    next_id: AtomicU64,
    fail_post: bool,
    fail_edit: bool,
}

impl FakeSurface {
    pub fn failing_post() -> Self {
        Self {
            fail_post: true,
            ..Default::default()
        }
    }

    pub fn failing_edit() -> Self {
        Self {
            fail_edit: true,
            ..Default::default()
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySurface for FakeSurface {
    type Handle = u64;
    type Error = PlatformFailure;

    async fn post_reply(&self, text: &str) -> Result<u64, PlatformFailure> {
        if self.fail_post {
            return Err(PlatformFailure);
        }
        self.ops.lock().unwrap().push(Op::Post(text.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn edit(&self, handle: &u64, text: &str) -> Result<(), PlatformFailure> {
        if self.fail_edit {
            return Err(PlatformFailure);
        }
        self.ops
            .lock()
            .unwrap()
            .push(Op::Edit(*handle, text.to_string()));
        Ok(())
    }

    async fn delete(&self, handle: &u64) -> Result<(), PlatformFailure> {
        self.ops.lock().unwrap().push(Op::Delete(*handle));
        Ok(())
    }
}

/// Completion backend that answers with a fixed text or a fixed failure.
pub struct ScriptedProvider {
    reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
    observed: Mutex<Vec<Vec<Op>>>,
    watch: Option<Arc<FakeSurface>>,
}

impl ScriptedProvider {
    pub fn answering(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            requests: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
            watch: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
            watch: None,
        }
    }

    /// Snapshot `surface` ops at the moment each request arrives.
    pub fn watching(mut self, surface: Arc<FakeSurface>) -> Self {
        self.watch = Some(surface);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn ops_at_call(&self) -> Vec<Vec<Op>> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(surface) = &self.watch {
            self.observed.lock().unwrap().push(surface.ops());
        }
        match &self.reply {
            Some(text) => Ok(ChatResponse {
                content: text.clone(),
                model: req.model.clone(),
                tokens_in: 10,
                tokens_out: 20,
                stop_reason: "stop".into(),
            }),
            None => Err(ProviderError::Api {
                status: 500,
                message: "upstream exploded".into(),
            }),
        }
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingReporter {
    pub fn stages(&self) -> Vec<&'static str> {
        self.entries.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, stage: &'static str, error: &(dyn Error + 'static)) {
        self.entries
            .lock()
            .unwrap()
            .push((stage, error.to_string()));
    }
}

pub struct FakeHistory {
    pub newest_first: Vec<HistoryMessage>,
    pub fail: bool,
}

#[async_trait]
impl ChannelHistory for FakeHistory {
    type Error = PlatformFailure;

    async fn recent(&self, limit: u8) -> Result<Vec<HistoryMessage>, PlatformFailure> {
        if self.fail {
            return Err(PlatformFailure);
        }
        Ok(self
            .newest_first
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

pub fn hist(author_id: u64, name: &str, bot: bool, content: &str) -> HistoryMessage {
    HistoryMessage {
        author_id,
        author_name: name.into(),
        author_is_bot: bot,
        content: content.into(),
    }
}
