//! Conversation error types.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors returned by conversation construction and message sending.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Invalid conversation configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("A generation is already in flight on this conversation")]
    Busy,

    #[error("Generation failed: {0}")]
    Generation(#[from] EngineError),

    #[error("Generation produced no tokens")]
    EmptyOutput,

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Failed to start background generation: {0}")]
    Spawn(String),
}

impl ConversationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true for errors detected before any state was touched.
    pub fn is_invalid_argument(&self) -> bool {
        match self {
            Self::InvalidConfig(_) | Self::InvalidMessage(_) => true,
            Self::Generation(e) => e.is_invalid_argument(),
            _ => false,
        }
    }

    /// Short label used for metrics.
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidMessage(_) => "invalid_message",
            Self::Busy => "busy",
            Self::Generation(e) if e.is_resource_exhausted() => "context_exhausted",
            Self::Generation(_) => "generation",
            Self::EmptyOutput => "empty_output",
            Self::Cancelled => "cancelled",
            Self::Spawn(_) => "spawn",
        }
    }
}
