//! Top-k / top-p sampler over tensor buffers.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

use super::{top_k_top_p_sampling, validate_params, Sampler, SamplingError};
use crate::tensor::{TensorBuffer, TensorError};
use crate::telemetry;

/// CPU sampler combining top-k, top-p and temperature.
///
/// Owns a seeded generator (state advances with every draw, so a fixed seed
/// and call sequence reproduce the same ids) and a scratch buffer used when
/// the logits are not host resident. The scratch buffer only grows.
#[derive(Debug)]
pub struct TopPSampler {
    k: usize,
    p: f32,
    temperature: f32,
    batch_size: usize,
    generator: StdRng,
    logits_scratch: Vec<f32>,
}

impl TopPSampler {
    /// Create a sampler. Fails if `k <= 0`, `p` is outside `[0, 1]`,
    /// `batch_size <= 0` or `temperature < 0`.
    pub fn create(
        k: i64,
        p: f32,
        temperature: f32,
        batch_size: i64,
        seed: u64,
    ) -> Result<Self, SamplingError> {
        validate_params(k, p, temperature, batch_size)?;
        Ok(Self {
            k: k as usize,
            p,
            temperature,
            batch_size: batch_size as usize,
            generator: StdRng::seed_from_u64(seed),
            logits_scratch: Vec::new(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Current scratch capacity in elements (0 until a download was needed).
    pub fn scratch_len(&self) -> usize {
        self.logits_scratch.len()
    }
}

fn validate_tensor(
    tensor: &dyn TensorBuffer,
    max_num_dims: usize,
    batch_size: usize,
    name: &str,
) -> Result<(), SamplingError> {
    let ty = tensor.tensor_type()?;
    let significant = ty.num_significant_dims();
    if significant > max_num_dims {
        return Err(SamplingError::InvalidArgument(format!(
            "The {name} tensor must have <={max_num_dims} significant dimension, but got {significant}"
        )));
    }
    let leading = ty.dims.first().copied().unwrap_or(0);
    if leading != batch_size {
        return Err(SamplingError::InvalidArgument(format!(
            "The {name} tensor must have the same batch size as the sampler, but got {leading} vs {batch_size}"
        )));
    }
    Ok(())
}

impl Sampler for TopPSampler {
    fn sample_to_id_and_score_buffer(
        &mut self,
        logits: &dyn TensorBuffer,
        ids: &mut dyn TensorBuffer,
        scores: Option<&mut dyn TensorBuffer>,
    ) -> Result<(), SamplingError> {
        validate_tensor(logits, 2, self.batch_size, "input logits")?;
        validate_tensor(ids, 1, self.batch_size, "output ids")?;
        if let Some(scores) = scores.as_deref() {
            validate_tensor(scores, 1, self.batch_size, "output scores")?;
        }

        let logits_data: &[f32] = match logits.host_f32() {
            Ok(data) => data,
            Err(TensorError::NotHostResident) => {
                let needed = logits.packed_size()? / std::mem::size_of::<f32>();
                if self.logits_scratch.len() < needed {
                    trace!(needed, "growing logits scratch buffer");
                    self.logits_scratch.resize(needed, 0.0);
                }
                logits.read_f32(&mut self.logits_scratch[..needed])?;
                &self.logits_scratch[..needed]
            }
            Err(e) => return Err(e.into()),
        };

        let sampled = top_k_top_p_sampling(
            logits_data,
            self.k,
            self.p,
            self.temperature,
            &mut self.generator,
            self.batch_size,
        )?;

        let sampled_ids: Vec<i32> = sampled.iter().map(|s| s.id).collect();
        ids.write_i32(&sampled_ids)?;
        if let Some(scores) = scores {
            let log_probs: Vec<f32> = sampled.iter().map(|s| s.probability.ln()).collect();
            scores.write_f32(&log_probs)?;
        }
        telemetry::record_sampler_call(self.batch_size);
        Ok(())
    }
}
