//! Next-token sampling for the generation session.
//!
//! Turns a `[batch, vocab]` logits buffer into one token id (and optionally
//! the log-probability of that token) per batch row, under top-k, top-p and
//! temperature controls.

mod cpu_util;
mod top_p;

pub use cpu_util::{top_k_top_p_sampling, SampledToken};
pub use top_p::TopPSampler;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tensor::{TensorBuffer, TensorError};

/// Errors that can occur while creating or running a sampler.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No candidate probability mass survives filtering in batch row {row}")]
    NoCandidates { row: usize },

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
}

/// Chooses token ids from logits. Implementations own mutable state (the RNG,
/// scratch memory), so calls on one instance must be serialized by the caller.
pub trait Sampler: Send {
    /// Sample one id per batch row into `ids`, and the natural log of its
    /// post-filter probability into `scores` when provided.
    fn sample_to_id_and_score_buffer(
        &mut self,
        logits: &dyn TensorBuffer,
        ids: &mut dyn TensorBuffer,
        scores: Option<&mut dyn TensorBuffer>,
    ) -> Result<(), SamplingError>;
}

/// Sampler parameters as carried in session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    /// Keep the `top_k` highest-scoring candidates (must be > 0).
    pub top_k: usize,
    /// Nucleus threshold in `[0, 1]`.
    pub top_p: f32,
    /// Softmax temperature (>= 0; 0 selects greedy arg-max).
    pub temperature: f32,
    /// Seed for the sampler's pseudorandom generator.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.95,
            temperature: 0.8,
            seed: 0,
        }
    }
}

impl SamplerParams {
    /// Validate parameter ranges. Batch size is checked at sampler creation.
    pub fn validate(&self) -> Result<(), SamplingError> {
        validate_params(self.top_k as i64, self.top_p, self.temperature, 1)
    }

    /// Build a [`TopPSampler`] for `batch_size` rows from these parameters.
    pub fn build(&self, batch_size: usize) -> Result<TopPSampler, SamplingError> {
        TopPSampler::create(
            self.top_k as i64,
            self.top_p,
            self.temperature,
            batch_size as i64,
            self.seed,
        )
    }
}

pub(crate) fn validate_params(
    k: i64,
    p: f32,
    temperature: f32,
    batch_size: i64,
) -> Result<(), SamplingError> {
    if k <= 0 {
        return Err(SamplingError::InvalidArgument("k must be positive".into()));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(SamplingError::InvalidArgument(format!(
            "p must be in [0, 1], but got {p}"
        )));
    }
    if batch_size <= 0 {
        return Err(SamplingError::InvalidArgument(
            "batch_size must be positive".into(),
        ));
    }
    if temperature.is_nan() || temperature < 0.0 {
        return Err(SamplingError::InvalidArgument(format!(
            "Temperature must be >= 0, but got {temperature}"
        )));
    }
    Ok(())
}
