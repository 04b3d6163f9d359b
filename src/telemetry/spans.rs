//! Span factory for conversation turns.

use tracing::{field, info_span, Span};

/// Record an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

pub struct TurnSpan;

impl TurnSpan {
    /// Span for one send on a conversation.
    ///
    /// `mode` is `sync` or `async`. `status`, `error.message`,
    /// `tokens_generated` and `latency_ms` are filled in when the turn ends.
    pub fn new(conversation_id: &str, mode: &'static str) -> Span {
        info_span!(
            "conversation_turn",
            conversation_id = %conversation_id,
            mode = mode,
            status = field::Empty,
            error.message = field::Empty,
            tokens_generated = field::Empty,
            latency_ms = field::Empty,
        )
    }
}
