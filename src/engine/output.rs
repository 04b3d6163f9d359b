//! Decode results reported by a session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Constraint;

/// Reason why a decode loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Model emitted a stop token.
    Stop,
    /// Hit `max_output_tokens`.
    MaxTokens,
    /// The decode constraint reached an accepting state.
    ConstraintComplete,
    /// The cancellation check fired.
    Cancelled,
}

/// Summary of one decode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub tokens_generated: usize,
    pub finish_reason: FinishReason,
}

impl DecodeOutcome {
    pub fn was_cancelled(&self) -> bool {
        self.finish_reason == FinishReason::Cancelled
    }
}

/// Per-turn decode configuration handed to the session.
#[derive(Clone, Default)]
pub struct DecodeConfig {
    /// Upper bound on generated tokens. `None` uses the session default.
    pub max_output_tokens: Option<usize>,
    /// Grammar restriction built from the declared tools, if any.
    pub constraint: Option<Arc<dyn Constraint>>,
}

impl std::fmt::Debug for DecodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeConfig")
            .field("max_output_tokens", &self.max_output_tokens)
            .field("constraint", &self.constraint.is_some())
            .finish()
    }
}
