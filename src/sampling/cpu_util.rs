//! Host-side top-k / top-p / temperature sampling over flat logits.

use std::cmp::Ordering;

use rand::Rng;

use super::SamplingError;

/// One sampled token and its post-filter, renormalized probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledToken {
    pub id: i32,
    pub probability: f32,
}

/// Sample one token per row from `logits`, laid out as `batch_size` rows of
/// equal length.
///
/// Per row: keep the `k` highest logits (ties to the lower index), apply
/// temperature softmax, truncate to the smallest descending prefix whose mass
/// reaches `p`, renormalize, then draw from `rng`. A temperature of zero is
/// greedy: the best candidate is returned with probability 1 and `rng` is
/// left untouched.
pub fn top_k_top_p_sampling<R: Rng + ?Sized>(
    logits: &[f32],
    k: usize,
    p: f32,
    temperature: f32,
    rng: &mut R,
    batch_size: usize,
) -> Result<Vec<SampledToken>, SamplingError> {
    if batch_size == 0 || logits.len() % batch_size != 0 {
        return Err(SamplingError::InvalidArgument(format!(
            "logits of length {} cannot be split into {} rows",
            logits.len(),
            batch_size
        )));
    }
    let vocab_size = logits.len() / batch_size;
    if vocab_size == 0 {
        return Err(SamplingError::NoCandidates { row: 0 });
    }
    let mut out = Vec::with_capacity(batch_size);
    let mut candidates = Vec::with_capacity(vocab_size);
    let mut probs = Vec::with_capacity(k.min(vocab_size));

    for (row_idx, row) in logits.chunks_exact(vocab_size).enumerate() {
        select_top_k(row, k, &mut candidates);
        out.push(sample_row(row, &candidates, p, temperature, rng, &mut probs, row_idx)?);
    }
    Ok(out)
}

fn rank_value(x: f32) -> f32 {
    if x.is_nan() {
        f32::NEG_INFINITY
    } else {
        x
    }
}

/// Descending by logit, ascending by index on ties. Total, so the selection
/// is deterministic.
fn by_logit_desc(row: &[f32], a: usize, b: usize) -> Ordering {
    rank_value(row[b])
        .total_cmp(&rank_value(row[a]))
        .then(a.cmp(&b))
}

fn select_top_k(row: &[f32], k: usize, candidates: &mut Vec<usize>) {
    candidates.clear();
    candidates.extend(0..row.len());
    let k = k.min(row.len());
    if k < candidates.len() {
        candidates.select_nth_unstable_by(k - 1, |&a, &b| by_logit_desc(row, a, b));
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(|&a, &b| by_logit_desc(row, a, b));
}

fn sample_row<R: Rng + ?Sized>(
    row: &[f32],
    candidates: &[usize],
    p: f32,
    temperature: f32,
    rng: &mut R,
    probs: &mut Vec<f64>,
    row_idx: usize,
) -> Result<SampledToken, SamplingError> {
    let Some(&best) = candidates.first() else {
        return Err(SamplingError::NoCandidates { row: row_idx });
    };
    let max_logit = rank_value(row[best]);
    if max_logit == f32::NEG_INFINITY {
        return Err(SamplingError::NoCandidates { row: row_idx });
    }
    if temperature == 0.0 {
        return Ok(SampledToken { id: best as i32, probability: 1.0 });
    }

    // Softmax over the candidates, shifted by the max for stability.
    probs.clear();
    let max = f64::from(max_logit);
    let temp = f64::from(temperature);
    probs.extend(
        candidates
            .iter()
            .map(|&i| ((f64::from(rank_value(row[i])) - max) / temp).exp()),
    );
    let total: f64 = probs.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(SamplingError::NoCandidates { row: row_idx });
    }
    for prob in probs.iter_mut() {
        *prob /= total;
    }

    // Nucleus truncation: candidates are already in descending order.
    let threshold = f64::from(p);
    let mut keep = probs.len();
    let mut cumulative = 0.0;
    for (i, prob) in probs.iter().enumerate() {
        cumulative += prob;
        if cumulative >= threshold {
            keep = i + 1;
            break;
        }
    }
    let kept = &probs[..keep];
    let kept_mass: f64 = kept.iter().sum();
    if !(kept_mass > 0.0) {
        return Err(SamplingError::NoCandidates { row: row_idx });
    }

    let target = rng.gen::<f64>() * kept_mass;
    let mut acc = 0.0;
    let mut chosen = keep - 1;
    for (i, prob) in kept.iter().enumerate() {
        acc += prob;
        if target < acc {
            chosen = i;
            break;
        }
    }

    Ok(SampledToken {
        id: candidates[chosen] as i32,
        probability: (kept[chosen] / kept_mass) as f32,
    })
}
