//! Error types for Newsdesk.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Analyst error: {0}")]
    Llm(#[from] LlmError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors. Malformed files on load are NOT errors — stores
/// degrade to empty and log a warning; these cover save failures only.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Feed-source errors. Per-source failures are isolated by the collector
/// and never abort a whole ingestion cycle.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse failed for {feed}: {reason}")]
    Parse { feed: String, reason: String },
}

/// Scoring/generation collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Chat-platform errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{method} failed: {reason}")]
    SendFailed { method: String, reason: String },

    #[error("{method} rejected by API: {description}")]
    Api { method: String, description: String },

    #[error("Malformed update payload: {0}")]
    InvalidUpdate(String),
}

/// Lifecycle errors — operator referenced something that is not there.
/// These never mutate state; the operator is told to retry.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Item {uid} is not in the workspace; run /check again")]
    UnknownItem { uid: String },

    #[error("Item {uid} has no draft yet; generate one first")]
    NoDraft { uid: String },

    #[error("Published post {uid} no longer exists")]
    UnknownPost { uid: String },

    #[error("Item {uid} has no pending reply proposal; publish again")]
    NoProposedReply { uid: String },

    #[error("Item {uid} is already published")]
    AlreadyPublished { uid: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_parse_error_reports_feed_name() {
        let e = FeedError::Parse {
            feed: "Autosport".into(),
            reason: "bad xml".into(),
        };
        assert_eq!(e.to_string(), "Feed parse failed for Autosport: bad xml");
        // Parse carries no underlying error to chain.
        assert!(std::error::Error::source(&e).is_none());
    }
}
