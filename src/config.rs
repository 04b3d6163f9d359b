//! Configuration loading from environment variables.
//!
//! Values come from `GG_CONVERSE_*` variables. Missing or invalid values fall
//! back to defaults and out-of-range values are clamped; loading never fails.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `GG_CONVERSE_MAX_OUTPUT_TOKENS` | 256 | Max tokens generated per turn |
//! | `GG_CONVERSE_TOP_K` | 40 | Sampler top-k |
//! | `GG_CONVERSE_TOP_P` | 0.95 | Sampler nucleus threshold, clamped to [0, 1] |
//! | `GG_CONVERSE_TEMPERATURE` | 0.8 | Sampler temperature, floored at 0 |
//! | `GG_CONVERSE_SEED` | 0 | Sampler seed |
//! | `GG_CONVERSE_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `GG_CONVERSE_LOG_FORMAT` | json | `json` or `pretty` |
//! | `GG_CONVERSE_LOG_FILE` | unset | Log to this file instead of stderr |

use std::path::PathBuf;

use crate::engine::SessionConfig;
use crate::sampling::SamplerParams;
use crate::telemetry::{LogConfig, LogFormat};

/// Upper bound for `GG_CONVERSE_MAX_OUTPUT_TOKENS`.
const MAX_OUTPUT_TOKENS_CEILING: usize = 1_000_000;

/// Everything loadable from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub session: SessionConfig,
    pub logging: LogConfig,
}

fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// NaN and infinities count as invalid.
fn parse_f32(key: &str, default: f32) -> f32 {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(default),
        Err(_) => default,
    }
}

fn load_sampler_params() -> SamplerParams {
    let defaults = SamplerParams::default();
    SamplerParams {
        top_k: parse_usize("GG_CONVERSE_TOP_K", defaults.top_k).max(1),
        top_p: parse_f32("GG_CONVERSE_TOP_P", defaults.top_p).clamp(0.0, 1.0),
        temperature: parse_f32("GG_CONVERSE_TEMPERATURE", defaults.temperature).max(0.0),
        seed: parse_u64("GG_CONVERSE_SEED", defaults.seed),
    }
}

/// Session defaults from the environment. The result always validates.
pub fn load_session_config() -> SessionConfig {
    let defaults = SessionConfig::default();
    let max_output_tokens = parse_usize("GG_CONVERSE_MAX_OUTPUT_TOKENS", defaults.max_output_tokens)
        .clamp(1, MAX_OUTPUT_TOKENS_CEILING);
    SessionConfig {
        max_output_tokens,
        sampler: load_sampler_params(),
        ..defaults
    }
}

pub fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("GG_CONVERSE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("GG_CONVERSE_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or(defaults.format);
    let output_path = std::env::var("GG_CONVERSE_LOG_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LogConfig { format, level, output_path }
}

pub fn load() -> EnvConfig {
    EnvConfig {
        session: load_session_config(),
        logging: load_log_config(),
    }
}
