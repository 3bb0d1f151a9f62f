//! Channel-agnostic relay pipeline: filter → context → completion → reply.
//!
//! Nothing in this crate knows about Discord. Platform adapters implement
//! [`context::ChannelHistory`] and [`reply::ReplySurface`] and hand inbound
//! events to [`relay::Relay::handle`].

pub mod context;
pub mod filter;
pub mod openai;
pub mod provider;
pub mod relay;
pub mod reply;
pub mod report;

pub use relay::{HandleOutcome, Relay};
