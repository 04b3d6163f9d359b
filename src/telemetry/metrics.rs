//! Metrics emitted through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder; without one
//! every call here is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

const TURNS: &str = "gg_converse_turns_total";
const TURN_LATENCY: &str = "gg_converse_turn_latency_ms";
const TURN_TOKENS: &str = "gg_converse_turn_tokens";
const PREFILL_TURNS: &str = "gg_converse_prefill_turns_total";
const SAMPLER_CALLS: &str = "gg_converse_sampler_calls_total";
const SAMPLED_TOKENS: &str = "gg_converse_sampled_tokens_total";

/// Register descriptions with the installed recorder. Safe to call repeatedly.
pub fn init_metrics() {
    describe_counter!(TURNS, "Conversation turns by terminal status");
    describe_histogram!(TURN_LATENCY, Unit::Milliseconds, "Wall time of a turn");
    describe_histogram!(TURN_TOKENS, Unit::Count, "Tokens generated per completed turn");
    describe_counter!(PREFILL_TURNS, "Turns submitted as prefill");
    describe_counter!(SAMPLER_CALLS, "Calls into the top-k/top-p sampler");
    describe_counter!(SAMPLED_TOKENS, "Tokens chosen by the sampler");
}

pub fn record_turn_completed(tokens: usize, latency_ms: u64) {
    counter!(TURNS, "status" => "completed").increment(1);
    histogram!(TURN_LATENCY).record(latency_ms as f64);
    histogram!(TURN_TOKENS).record(tokens as f64);
}

pub fn record_turn_failed(reason: &'static str) {
    counter!(TURNS, "status" => "failed", "reason" => reason).increment(1);
}

pub fn record_turn_cancelled() {
    counter!(TURNS, "status" => "cancelled").increment(1);
}

pub fn record_prefill_turns(turns: usize) {
    counter!(PREFILL_TURNS).increment(turns as u64);
}

pub fn record_sampler_call(batch_size: usize) {
    counter!(SAMPLER_CALLS).increment(1);
    counter!(SAMPLED_TOKENS).increment(batch_size as u64);
}
