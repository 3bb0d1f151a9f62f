use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnarkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid channel id in allowlist: {value:?}")]
    InvalidChannelId { value: String },

    #[error("Missing required setting: {key}")]
    MissingSetting { key: &'static str },
}

pub type Result<T> = std::result::Result<T, SnarkError>;
