//! Next-token sampling for the image decoder.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::error::{Error, Result};

/// Number of entries in the VQGAN codebook.
pub const IMAGE_VOCAB_COUNT: usize = 1 << 14;

/// Knobs controlling one sampling step.
#[derive(Debug, Clone, Copy)]
pub struct SamplingSettings {
    pub temperature: f32,
    pub top_k: usize,
    pub supercondition_factor: f32,
}

/// Draw the next image token.
///
/// `unconditioned` and `conditioned` are the decoder logits for the same
/// sample with and without the prompt. Only the first
/// [`IMAGE_VOCAB_COUNT`] entries are considered.
///
/// # Errors
///
/// Returns an error if the logits are shorter than `top_k` or no candidate
/// has a usable weight.
#[allow(clippy::cast_possible_wrap)]
pub fn sample_token<R: Rng + ?Sized>(
    unconditioned: &[f32],
    conditioned: &[f32],
    settings: &SamplingSettings,
    rng: &mut R,
) -> Result<i64> {
    let count = unconditioned
        .len()
        .min(conditioned.len())
        .min(IMAGE_VOCAB_COUNT);

    if settings.top_k == 0 || settings.top_k > count {
        return Err(Error::ShapeMismatch {
            expected: format!("at least {} logits", settings.top_k.max(1)),
            actual: count.to_string(),
        });
    }

    let s = settings.supercondition_factor;
    let logits: Vec<f32> = unconditioned[..count]
        .iter()
        .zip(&conditioned[..count])
        .map(|(&u, &c)| u.mul_add(1.0 - s, c * s))
        .collect();

    let (threshold, max) = top_k_bounds(&logits, settings.top_k);

    let weights: Vec<f32> = logits
        .iter()
        .map(|&l| {
            if l >= threshold {
                ((l - max) / settings.temperature).exp()
            } else {
                0.0
            }
        })
        .collect();

    let dist = WeightedIndex::new(&weights).map_err(|err| Error::ShapeMismatch {
        expected: "a finite distribution over candidate tokens".to_string(),
        actual: err.to_string(),
    })?;

    Ok(dist.sample(rng) as i64)
}

/// Value of the `k`-th largest logit and the largest one.
fn top_k_bounds(logits: &[f32], k: usize) -> (f32, f32) {
    let mut sorted = logits.to_vec();
    let (_, kth, _) = sorted.select_nth_unstable_by(k - 1, |a, b| b.total_cmp(a));
    let threshold = *kth;
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (threshold, max)
}
