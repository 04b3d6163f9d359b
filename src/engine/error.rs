//! Generation engine error types.
//!
//! Errors from the session are surfaced to callers verbatim; nothing in this
//! crate retries them.

use thiserror::Error;

use crate::sampling::SamplingError;

/// Errors reported by an engine or one of its sessions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("Input validation failed: {0}")]
    InputValidation(String),

    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    #[error("Context length exceeded: max {max}, got {got}")]
    ContextExceeded { max: usize, got: usize },

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Sampling failed: {0}")]
    Sampling(#[from] SamplingError),
}

impl EngineError {
    /// Returns true if the caller supplied something the engine cannot accept.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::InputValidation(_)
                | Self::CapabilityNotSupported(_)
                | Self::Sampling(SamplingError::InvalidArgument(_))
        )
    }

    /// Returns true if the model's running context is exhausted.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ContextExceeded { .. })
    }
}
