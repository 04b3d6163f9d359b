//! Logging, tracing spans and metrics for conversations.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_prefill_turns, record_sampler_call, record_turn_cancelled,
    record_turn_completed, record_turn_failed,
};
pub use spans::{SpanExt, TurnSpan};
