//! Next-Token Sampling
//!
//! Converts raw per-token scores into a ranked candidate list:
//! temperature scaling, top-k selection, a softmax over the kept
//! candidates, nucleus (top-p) marking and exactly one sampled outcome.
//!
//! Everything here is pure. Token text comes from a caller-supplied
//! decode function and randomness from a caller-supplied [`rand::Rng`],
//! so ranking is reproducible given a seeded generator.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod config;
pub mod nucleus;

pub use config::{ConfigError, SamplingConfig, MIN_TEMPERATURE};
pub use nucleus::{mark_nucleus, mark_sampled, nucleus_len, NUCLEUS_EPSILON};

/// A top-k candidate before probabilities are assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    /// Vocabulary id
    pub id: u32,
    /// Decoded token text
    pub text: String,
    /// Unscaled model score
    pub raw_score: f32,
}

/// A ranked candidate with its probabilities and sampling flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Vocabulary id
    pub id: u32,
    /// Decoded token text
    pub text: String,
    /// Unscaled model score
    pub raw_score: f32,
    /// Softmax probability over the top-k set
    pub probability: f32,
    /// Member of the top-p prefix
    pub in_nucleus: bool,
    /// Probability renormalized over the nucleus (0 outside it)
    pub nucleus_probability: f32,
    /// The one candidate chosen by the draw
    pub is_sampled: bool,
}

impl Prediction {
    fn from_candidate(candidate: ScoredCandidate, probability: f32) -> Self {
        Self {
            id: candidate.id,
            text: candidate.text,
            raw_score: candidate.raw_score,
            probability,
            in_nucleus: false,
            nucleus_probability: 0.0,
            is_sampled: false,
        }
    }
}

/// Numerically stable in-place softmax.
///
/// 1. Masks NaN to -inf (same ordering as [`top_k_indices`])
/// 2. Finds the max
/// 3. Computes exp(x - max) and the sum; +inf entries share all the mass
/// 4. Normalizes
pub fn softmax(x: &mut [f32]) {
    if x.is_empty() {
        return;
    }

    for v in x.iter_mut().filter(|v| v.is_nan()) {
        *v = f32::NEG_INFINITY;
    }
    let max_val = x.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for v in x.iter_mut() {
        *v = if max_val == f32::INFINITY {
            if *v == f32::INFINITY { 1.0 } else { 0.0 }
        } else {
            (*v - max_val).exp()
        };
        sum += *v;
    }

    if !(sum > 0.0) || !sum.is_finite() {
        let uniform = 1.0 / x.len() as f32;
        x.iter_mut().for_each(|v| *v = uniform);
        return;
    }

    let inv_sum = 1.0 / sum;
    for v in x.iter_mut() {
        *v *= inv_sum;
    }
}

/// Indices of the `k` largest values, in descending value order.
///
/// Ties are broken by index ascending so the result is deterministic.
/// NaN sorts below every number.
pub fn top_k_indices(values: &[f32], k: usize) -> Vec<usize> {
    let k = k.min(values.len());
    if k == 0 {
        return Vec::new();
    }

    let key = |v: f32| if v.is_nan() { f32::NEG_INFINITY } else { v };
    let order = |a: &usize, b: &usize| key(values[*b]).total_cmp(&key(values[*a])).then(a.cmp(b));

    let mut indices: Vec<usize> = (0..values.len()).collect();
    if k < indices.len() {
        indices.select_nth_unstable_by(k - 1, order);
        indices.truncate(k);
    }
    indices.sort_by(order);
    indices
}

/// Select the top-k candidates by temperature-scaled score and decode their text
pub fn select_candidates<F, E>(
    scores: &[f32],
    config: &SamplingConfig,
    mut decode: F,
) -> Result<Vec<ScoredCandidate>, E>
where
    F: FnMut(u32) -> Result<String, E>,
{
    let inv_temp = 1.0 / config.effective_temperature();
    let scaled: Vec<f32> = scores.iter().map(|&s| s * inv_temp).collect();

    top_k_indices(&scaled, config.effective_top_k())
        .into_iter()
        .map(|i| {
            let id = i as u32;
            Ok(ScoredCandidate {
                id,
                text: decode(id)?,
                raw_score: scores[i],
            })
        })
        .collect()
}

/// Steps 1-5 of the pipeline: scale, select top-k, softmax, mark the nucleus.
///
/// No candidate is marked sampled. Returns an empty list for empty `scores`.
pub fn rank<F, E>(scores: &[f32], config: &SamplingConfig, decode: F) -> Result<Vec<Prediction>, E>
where
    F: FnMut(u32) -> Result<String, E>,
{
    if scores.is_empty() {
        return Ok(Vec::new());
    }
    if config.needs_clamping() {
        warn!(
            temperature = config.temperature,
            top_k = config.top_k,
            top_p = config.top_p,
            "sampling parameters out of range, clamping"
        );
    }

    let candidates = select_candidates(scores, config, decode)?;

    let inv_temp = 1.0 / config.effective_temperature();
    let mut probs: Vec<f32> = candidates.iter().map(|c| c.raw_score * inv_temp).collect();
    softmax(&mut probs);

    let mut predictions: Vec<Prediction> = candidates
        .into_iter()
        .zip(probs)
        .map(|(c, p)| Prediction::from_candidate(c, p))
        .collect();

    let kept = mark_nucleus(&mut predictions, config.effective_top_p());
    debug!(
        vocab = scores.len(),
        top_k = predictions.len(),
        nucleus = kept,
        "ranked candidates"
    );

    Ok(predictions)
}

/// Rank and sample with a fixed uniform draw `r ∈ [0, 1)`
pub fn sample_with_draw<F, E>(
    scores: &[f32],
    config: &SamplingConfig,
    decode: F,
    r: f32,
) -> Result<Vec<Prediction>, E>
where
    F: FnMut(u32) -> Result<String, E>,
{
    let mut predictions = rank(scores, config, decode)?;
    mark_sampled(&mut predictions, r);
    Ok(predictions)
}

/// Rank and sample, drawing the uniform number from `rng`.
///
/// Probability and nucleus fields depend only on `scores` and `config`;
/// the sampled member varies with the draw.
pub fn sample<F, E, R>(
    scores: &[f32],
    config: &SamplingConfig,
    decode: F,
    rng: &mut R,
) -> Result<Vec<Prediction>, E>
where
    F: FnMut(u32) -> Result<String, E>,
    R: Rng + ?Sized,
{
    let mut predictions = rank(scores, config, decode)?;
    if !predictions.is_empty() {
        let r: f32 = rng.random();
        mark_sampled(&mut predictions, r);
    }
    Ok(predictions)
}

/// Redraw the sampled member of an already ranked list
pub fn resample<R: Rng + ?Sized>(predictions: &mut [Prediction], rng: &mut R) -> Option<usize> {
    if predictions.is_empty() {
        return None;
    }
    let r: f32 = rng.random();
    mark_sampled(predictions, r)
}

/// The sampled prediction, if any
pub fn sampled(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions.iter().find(|p| p.is_sampled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::convert::Infallible;

    fn decode(id: u32) -> Result<String, Infallible> {
        Ok(format!("tok{}", id))
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut x = vec![1.0, 2.0, 3.0, 4.0];
        softmax(&mut x);
        let sum: f32 = x.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(x[3] > x[2] && x[2] > x[1]);
    }

    #[test]
    fn test_softmax_large_values_stable() {
        let mut x = vec![1000.0, 1000.0];
        softmax(&mut x);
        assert!((x[0] - 0.5).abs() < 1e-6);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_softmax_degenerate_is_uniform() {
        let mut x = vec![f32::NEG_INFINITY, f32::NEG_INFINITY];
        softmax(&mut x);
        assert!((x[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_ignores_nan() {
        let mut x = vec![10.0, 0.0, f32::NAN];
        softmax(&mut x);
        assert_eq!(x[2], 0.0);
        assert!(x[0] > 0.999);
        assert!((x.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_infinite_max_takes_all_mass() {
        let mut x = vec![f32::INFINITY, 1.0, f32::INFINITY];
        softmax(&mut x);
        assert_eq!(x, vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_rank_with_nan_score() {
        let scores = [10.0, 0.0, f32::NAN];
        let preds = rank(&scores, &SamplingConfig::new(1.0, 3, 1.0), decode).unwrap();
        assert_eq!(preds.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(preds[0].probability > 0.999);
        assert_eq!(preds[2].probability, 0.0);
    }

    #[test]
    fn test_top_k_ties_by_index() {
        let values = [1.0, 3.0, 3.0, 2.0, 3.0];
        assert_eq!(top_k_indices(&values, 3), vec![1, 2, 4]);
        assert_eq!(top_k_indices(&values, 4), vec![1, 2, 4, 3]);
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let values = [0.5, 0.1];
        assert_eq!(top_k_indices(&values, 10), vec![0, 1]);
        assert!(top_k_indices(&values, 0).is_empty());
    }

    #[test]
    fn test_top_k_nan_sorts_last() {
        let values = [f32::NAN, 1.0, 0.0];
        assert_eq!(top_k_indices(&values, 3), vec![1, 2, 0]);
    }

    #[test]
    fn test_rank_carries_raw_scores_and_text() {
        let scores = [0.1, 2.0, -1.0];
        let preds = rank(&scores, &SamplingConfig::new(1.0, 2, 1.0), decode).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].id, 1);
        assert_eq!(preds[0].text, "tok1");
        assert_eq!(preds[0].raw_score, 2.0);
        assert!(preds.iter().all(|p| !p.is_sampled));
    }

    #[test]
    fn test_temperature_flattens_distribution() {
        let scores = [2.0, 1.0, 0.0];
        let cold = rank(&scores, &SamplingConfig::new(0.5, 3, 1.0), decode).unwrap();
        let hot = rank(&scores, &SamplingConfig::new(2.0, 3, 1.0), decode).unwrap();
        assert!(cold[0].probability > hot[0].probability);
    }

    #[test]
    fn test_zero_temperature_does_not_divide_by_zero() {
        let scores = [2.0, 1.0, 0.0];
        let preds = rank(&scores, &SamplingConfig::new(0.0, 3, 1.0), decode).unwrap();
        assert!(preds.iter().all(|p| p.probability.is_finite()));
        assert!(preds[0].probability > 0.99);
    }

    #[test]
    fn test_empty_scores_yield_empty_result() {
        let mut rng = StdRng::seed_from_u64(1);
        let preds = sample(&[], &SamplingConfig::default(), decode, &mut rng).unwrap();
        assert!(preds.is_empty());
        assert!(sampled(&preds).is_none());
    }

    #[test]
    fn test_decode_error_propagates() {
        let scores = [1.0, 2.0];
        let result: Result<Vec<Prediction>, String> =
            rank(&scores, &SamplingConfig::default(), |id| Err(format!("unknown {}", id)));
        assert_eq!(result.unwrap_err(), "unknown 1");
    }

    #[test]
    fn test_sample_marks_exactly_one() {
        let scores: Vec<f32> = (0..50).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let preds = sample(&scores, &SamplingConfig::default(), decode, &mut rng).unwrap();
            assert_eq!(preds.iter().filter(|p| p.is_sampled).count(), 1);
            assert!(sampled(&preds).unwrap().in_nucleus);
        }
    }

    #[test]
    fn test_resample_keeps_probabilities() {
        let scores = [3.0, 2.0, 1.0, 0.0];
        let mut rng = StdRng::seed_from_u64(3);
        let mut preds = sample(&scores, &SamplingConfig::new(1.0, 4, 1.0), decode, &mut rng).unwrap();
        let before: Vec<f32> = preds.iter().map(|p| p.probability).collect();
        resample(&mut preds, &mut rng);
        let after: Vec<f32> = preds.iter().map(|p| p.probability).collect();
        assert_eq!(before, after);
        assert_eq!(preds.iter().filter(|p| p.is_sampled).count(), 1);
    }
}
