use std::collections::BTreeSet;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, SnarkError};

// Platform and model defaults — kept in sync with the documented env contract.
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_IGNORE_PREFIX: &str = "!";
pub const DEFAULT_CONFIG_FILE: &str = "snark.toml";
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You're a sarcastic chatbot in a Discord server. Keep your responses to 5 or fewer sentences.";

/// Environment keys read at startup (matched case-insensitively).
const ENV_KEYS: [&str; 9] = [
    "discord_token",
    "openai_api_key",
    "openai_model",
    "openai_base_url",
    "max_tokens",
    "channel_id",
    "ignore_message_prefix",
    "system_message",
    "foreign_users",
];

/// Relay configuration, loaded once at process start and shared read-only.
///
/// Sources, later wins:
///   1. TOML file (explicit path, `SNARK_CONFIG`, or `./snark.toml`)
///   2. Plain env vars (`DISCORD_TOKEN`, `OPENAI_API_KEY`, `CHANNEL_ID`, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(deserialize_with = "lenient_string")]
    pub discord_token: String,
    #[serde(deserialize_with = "lenient_string")]
    pub openai_api_key: String,
    #[serde(default = "default_model", deserialize_with = "lenient_string")]
    pub openai_model: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Channels the relay answers in. `CHANNEL_ID=111-222-333`.
    #[serde(rename = "channel_id")]
    pub channels: ChannelAllowlist,
    /// Messages starting with this prefix are invisible to the relay.
    #[serde(default = "default_ignore_prefix", deserialize_with = "lenient_string")]
    pub ignore_message_prefix: String,
    /// Persona instruction sent as the leading system turn.
    #[serde(default = "default_system_message", deserialize_with = "lenient_string")]
    pub system_message: String,
    #[serde(default)]
    pub foreign_users: ForeignUserPolicy,
}

impl RelayConfig {
    /// Load config from an optional TOML file with plain env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("SNARK_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let figment = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::raw().only(&ENV_KEYS));

        Self::from_figment(figment)
    }

    /// Extract and validate from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: RelayConfig = figment
            .extract()
            .map_err(|e| SnarkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            return Err(SnarkError::MissingSetting {
                key: "DISCORD_TOKEN",
            });
        }
        if self.openai_api_key.trim().is_empty() {
            return Err(SnarkError::MissingSetting {
                key: "OPENAI_API_KEY",
            });
        }
        if self.channels.is_empty() {
            return Err(SnarkError::MissingSetting { key: "CHANNEL_ID" });
        }
        if self.max_tokens == 0 {
            return Err(SnarkError::Config("max_tokens must be positive".into()));
        }
        Ok(())
    }
}

/// How history messages from humans other than the triggering user are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeignUserPolicy {
    /// Leave them out of the context window.
    #[default]
    Drop,
    /// Include them as unnamed user turns.
    Anonymous,
}

/// Static set of Discord channel ids the relay may respond in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAllowlist")]
pub struct ChannelAllowlist {
    ids: BTreeSet<u64>,
}

impl ChannelAllowlist {
    /// Parse a `-` (or `,`) separated list of channel ids. Blank segments are skipped.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut ids = BTreeSet::new();
        for part in raw.split(['-', ',']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let id = part
                .parse::<u64>()
                .map_err(|_| SnarkError::InvalidChannelId {
                    value: part.to_string(),
                })?;
            ids.insert(id);
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, channel_id: u64) -> bool {
        self.ids.contains(&channel_id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

impl FromIterator<u64> for ChannelAllowlist {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

// Env values arrive typed: a lone id parses as a number, `111-222` as a string,
// and a TOML file may use a proper array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAllowlist {
    Id(u64),
    Text(String),
    List(Vec<u64>),
}

impl TryFrom<RawAllowlist> for ChannelAllowlist {
    type Error = SnarkError;

    fn try_from(raw: RawAllowlist) -> Result<Self> {
        match raw {
            RawAllowlist::Id(id) => Ok(std::iter::once(id).collect()),
            RawAllowlist::Text(s) => ChannelAllowlist::parse(&s),
            RawAllowlist::List(ids) => Ok(ids.into_iter().collect()),
        }
    }
}

// Env values are type-guessed (`IGNORE_MESSAGE_PREFIX=1` arrives as a number),
// so plain-text settings take any scalar and keep its textual form.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_ignore_prefix() -> String {
    DEFAULT_IGNORE_PREFIX.to_string()
}
fn default_system_message() -> String {
    DEFAULT_SYSTEM_MESSAGE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<RelayConfig> {
        RelayConfig::from_figment(Figment::from(Toml::string(toml)))
    }

    const TOML_FILE: &str = r#"
        discord_token = "file-token"
        openai_api_key = "sk-file"
        channel_id = "1"
        openai_model = "gpt-3.5-turbo"
    "#;

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("relay.toml", TOML_FILE)?;
            jail.set_env("OPENAI_MODEL", "gpt-4o");
            jail.set_env("CHANNEL_ID", "111-222");

            let config = RelayConfig::load(Some("relay.toml")).unwrap();
            assert_eq!(config.openai_model, "gpt-4o");
            assert_eq!(config.discord_token, "file-token");
            assert!(config.channels.contains(111));
            assert!(config.channels.contains(222));
            assert!(!config.channels.contains(1));
            Ok(())
        });
    }

    #[test]
    fn numeric_and_boolean_env_text_stays_text() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "tok");
            jail.set_env("OPENAI_API_KEY", "12345");
            jail.set_env("CHANNEL_ID", "1095759091869167747");
            jail.set_env("IGNORE_MESSAGE_PREFIX", "1");
            jail.set_env("SYSTEM_MESSAGE", "true");

            let config = RelayConfig::load(Some("missing.toml")).unwrap();
            assert_eq!(config.ignore_message_prefix, "1");
            assert_eq!(config.system_message, "true");
            assert_eq!(config.openai_api_key, "12345");
            assert!(config.channels.contains(1095759091869167747));
            Ok(())
        });
    }

    #[test]
    fn env_only_config_uses_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("DISCORD_TOKEN", "tok");
            jail.set_env("OPENAI_API_KEY", "sk-env");
            jail.set_env("CHANNEL_ID", "5-6-7");

            let config = RelayConfig::load(Some("missing.toml")).unwrap();
            assert_eq!(config.openai_model, DEFAULT_MODEL);
            assert_eq!(config.ignore_message_prefix, DEFAULT_IGNORE_PREFIX);
            assert_eq!(config.channels.len(), 3);
            Ok(())
        });
    }

    #[test]
    fn allowlist_splits_on_dash() {
        let list = ChannelAllowlist::parse("111-222-333").unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.contains(222));
        assert!(!list.contains(444));
    }

    #[test]
    fn allowlist_accepts_commas_and_blank_segments() {
        let list = ChannelAllowlist::parse(" 111, 222--333 ").unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.contains(111));
        assert!(list.contains(333));
    }

    #[test]
    fn allowlist_rejects_non_numeric_ids() {
        let err = ChannelAllowlist::parse("111-general").unwrap_err();
        assert!(matches!(err, SnarkError::InvalidChannelId { ref value } if value == "general"));
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = from_toml(
            r#"
            discord_token = "tok"
            openai_api_key = "sk-test"
            channel_id = "111-222"
            "#,
        )
        .unwrap();

        assert_eq!(config.openai_model, DEFAULT_MODEL);
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.ignore_message_prefix, "!");
        assert_eq!(config.system_message, DEFAULT_SYSTEM_MESSAGE);
        assert_eq!(config.foreign_users, ForeignUserPolicy::Drop);
        assert!(config.channels.contains(111));
        assert!(config.channels.contains(222));
    }

    #[test]
    fn single_numeric_channel_id() {
        let config = from_toml(
            r#"
            discord_token = "tok"
            openai_api_key = "sk-test"
            channel_id = 1095759091869167747
            "#,
        )
        .unwrap();
        assert!(config.channels.contains(1095759091869167747));
    }

    #[test]
    fn channel_id_array_in_toml() {
        let config = from_toml(
            r#"
            discord_token = "tok"
            openai_api_key = "sk-test"
            channel_id = [1, 2, 3]
            foreign_users = "anonymous"
            openai_model = "gpt-4o-mini"
            "#,
        )
        .unwrap();
        assert_eq!(config.channels.len(), 3);
        assert_eq!(config.foreign_users, ForeignUserPolicy::Anonymous);
        assert_eq!(config.openai_model, "gpt-4o-mini");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = from_toml(
            r#"
            openai_api_key = "sk-test"
            channel_id = "111"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SnarkError::Config(_)));
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let err = from_toml(
            r#"
            discord_token = "tok"
            openai_api_key = "  "
            channel_id = "111"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SnarkError::MissingSetting {
                key: "OPENAI_API_KEY"
            }
        ));
    }

    #[test]
    fn empty_allowlist_is_rejected() {
        let err = from_toml(
            r#"
            discord_token = "tok"
            openai_api_key = "sk-test"
            channel_id = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SnarkError::MissingSetting { key: "CHANNEL_ID" }));
    }
}
