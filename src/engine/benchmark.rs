//! Benchmark counters pulled from a session on demand.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Token count and wall time for one prefill or decode turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnThroughput {
    pub num_tokens: usize,
    pub duration: Duration,
}

impl TurnThroughput {
    pub fn new(num_tokens: usize, duration: Duration) -> Self {
        Self { num_tokens, duration }
    }

    /// Tokens per second, 0.0 for an empty duration.
    pub fn tokens_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.num_tokens as f64 / secs
    }
}

/// Read-only snapshot of a session's timing counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkInfo {
    /// Time from the first prefill to the first decoded token.
    pub time_to_first_token: Option<Duration>,
    pub prefill_turns: Vec<TurnThroughput>,
    pub decode_turns: Vec<TurnThroughput>,
}

impl BenchmarkInfo {
    pub fn num_prefill_turns(&self) -> usize {
        self.prefill_turns.len()
    }

    pub fn num_decode_turns(&self) -> usize {
        self.decode_turns.len()
    }

    pub fn prefill_tokens_per_sec(&self, turn: usize) -> Option<f64> {
        self.prefill_turns.get(turn).map(TurnThroughput::tokens_per_sec)
    }

    pub fn decode_tokens_per_sec(&self, turn: usize) -> Option<f64> {
        self.decode_turns.get(turn).map(TurnThroughput::tokens_per_sec)
    }
}
