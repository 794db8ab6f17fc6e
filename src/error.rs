//! Error types.
//!
//! Library modules return these typed errors; `main` wraps them in
//! `anyhow` with context.

use thiserror::Error;

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<String>),

    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid crew definition: {0}")]
    Crew(String),
}

/// Errors talking to the language model.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to the model API: {0}")]
    Connect(String),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode model response: {0}")]
    Decode(String),

    #[error("Model returned no usable content (finish reason: {})", .0.as_deref().unwrap_or("unknown"))]
    EmptyResponse(Option<String>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors from the web search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while assembling or running the crew.
#[derive(Debug, Error)]
pub enum CrewError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: LlmError,
    },

    #[error("Planning failed: {0}")]
    Planning(#[source] LlmError),

    #[error("Crew has no tasks to run")]
    NoTasks,
}

/// Errors reported by a notification transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport rejected the formatting markup of the message.
    #[error("Markup parse failure: {0}")]
    MarkupParse(String),

    #[error("Transport API error {status}: {description}")]
    Api { status: u16, description: String },

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

/// Request URLs carry the bot token, so it is stripped from every error.
impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.without_url())
    }
}

/// Notification failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A chunk was rejected; chunks already sent stay sent.
    #[error("Delivery aborted after {sent} of {total} chunk(s): {source}")]
    Delivery {
        sent: usize,
        total: usize,
        #[source]
        source: TransportError,
    },

    #[error("Connection check failed: {0}")]
    Connection(#[source] TransportError),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Scheduler configuration errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Cron expression must have 5 fields (minute hour day month weekday), got {0}: {1:?}")]
    CronFieldCount(usize, String),

    #[error("Invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Interval must be at least 1 minute")]
    ZeroInterval,

    #[error("Interval of {0} minutes is too large")]
    IntervalTooLarge(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_vars_message_lists_all() {
        let err = ConfigError::MissingVars(vec![
            "GEMINI_API_KEY".to_string(),
            "TELEGRAM_CHAT_ID".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: GEMINI_API_KEY, TELEGRAM_CHAT_ID"
        );
    }

    #[test]
    fn test_notify_error_message() {
        let err = NotifyError::Delivery {
            sent: 1,
            total: 3,
            source: TransportError::Api {
                status: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            },
        };
        assert!(err.to_string().starts_with("Delivery aborted after 1 of 3 chunk(s)"));
    }
}
