//! Error types for the agent registry.
//!
//! Registry operations themselves never fail with these: misses and
//! rejections degrade to `None`/`false` plus a log line. These cover
//! configuration loading, admission rejection reasons, and handler failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse manifest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Label that names no page context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown page context: {0:?}")]
pub struct ParseContextError(pub String);

/// Why a channel could not be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("channel carries no sender information")]
    NoSenderInfo,
}

/// Failure reported by an event handler.
///
/// Publication logs it and moves on to the next handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub Box<dyn std::error::Error + Send + Sync>);

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }
}
