pub mod config;
pub mod error;

pub use config::{ChannelAllowlist, ForeignUserPolicy, RelayConfig};
pub use error::{Result, SnarkError};
