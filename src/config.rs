//! Configuration — assembled from environment variables (`.env` supported).

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::feed::FeedSource;

/// What to do when the thread resolver itself fails (as opposed to
/// confidently returning "no match"). Publishing proceeds without a reply
/// either way; `Warn` additionally surfaces a notice to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverFailurePolicy {
    Silent,
    Warn,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token.
    pub bot_token: SecretString,
    /// Target channel for published posts (`@name` or `-100…` id).
    pub channel_chat: String,
    /// API key for the scoring/generation service.
    pub openai_api_key: SecretString,
    /// Model name for all analyst calls.
    pub openai_model: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Interval between automatic feed checks.
    pub check_interval: Duration,
    /// Initial hype threshold for alerting (1–10, adjustable via /sethype).
    pub hype_threshold: u8,
    /// Directory holding the flat-file stores.
    pub data_dir: PathBuf,
    /// Policy for thread-resolver failures during publish.
    pub resolver_failure_policy: ResolverFailurePolicy,
    /// Feed sources to poll each cycle.
    pub feeds: Vec<FeedSource>,
}

impl Config {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = require("TELEGRAM_BOT_TOKEN")?;
        let channel_chat = require("TELEGRAM_CHANNEL_ID")?;
        let openai_api_key = require("OPENAI_API_KEY")?;

        let openai_model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let openai_base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let check_minutes: u64 = parse_env("CHECK_INTERVAL_MINUTES", 10)?;
        let hype_threshold: u8 = parse_env("HYPE_THRESHOLD", 7)?;
        if !(1..=10).contains(&hype_threshold) {
            return Err(ConfigError::InvalidValue {
                key: "HYPE_THRESHOLD".to_string(),
                message: format!("{hype_threshold} is outside 1..=10"),
            });
        }

        let data_dir = std::env::var("NEWSDESK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let resolver_failure_policy = match std::env::var("RESOLVER_FAILURE_POLICY")
            .unwrap_or_else(|_| "warn".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "silent" => ResolverFailurePolicy::Silent,
            "warn" => ResolverFailurePolicy::Warn,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "RESOLVER_FAILURE_POLICY".to_string(),
                    message: format!("expected 'silent' or 'warn', got '{other}'"),
                });
            }
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            channel_chat,
            openai_api_key: SecretString::from(openai_api_key),
            openai_model,
            openai_base_url,
            check_interval: Duration::from_secs(check_minutes * 60),
            hype_threshold,
            data_dir,
            resolver_failure_policy,
            feeds: FeedSource::defaults(),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_uses_default_when_unset() {
        let v: u8 = parse_env("NEWSDESK_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn require_rejects_empty() {
        // Safety: test-only env mutation, key is unique to this test.
        unsafe { std::env::set_var("NEWSDESK_TEST_EMPTY_KEY", "  ") };
        assert!(require("NEWSDESK_TEST_EMPTY_KEY").is_err());
    }
}
