//! Nucleus (top-p) marking and the single sampled draw

use crate::Prediction;

/// Slack applied when comparing a running probability sum against `top_p`.
/// Absorbs f32 accumulation error so that e.g. 3 × 0.1 reaches 0.3.
pub const NUCLEUS_EPSILON: f32 = 1e-6;

/// Mark the smallest probability-descending prefix whose mass reaches `top_p`
/// and fill in `nucleus_probability` for its members.
///
/// `predictions` must already be sorted by descending probability.
/// Returns the nucleus length.
pub fn mark_nucleus(predictions: &mut [Prediction], top_p: f32) -> usize {
    if predictions.is_empty() {
        return 0;
    }

    let mut cumulative = 0.0f32;
    let mut len = predictions.len();
    if top_p < 1.0 {
        for (i, p) in predictions.iter().enumerate() {
            cumulative += p.probability;
            if cumulative + NUCLEUS_EPSILON >= top_p {
                len = i + 1;
                break;
            }
        }
    }

    for (i, p) in predictions.iter_mut().enumerate() {
        p.in_nucleus = i < len;
        p.nucleus_probability = 0.0;
        p.is_sampled = false;
    }

    let mass: f32 = predictions[..len].iter().map(|p| p.probability).sum();
    for p in predictions[..len].iter_mut() {
        p.nucleus_probability = if mass > 0.0 {
            p.probability / mass
        } else {
            1.0 / len as f32
        };
    }

    len
}

/// Mark exactly one nucleus member as sampled using the uniform draw `r ∈ [0, 1)`.
///
/// Walks nucleus members accumulating `nucleus_probability`; the first member
/// whose cumulative sum reaches `r` wins. If rounding leaves every cumulative
/// sum below `r`, the first nucleus member is taken. That fallback is a fixed
/// tie-break rule and slightly favours the top candidate.
///
/// Returns the sampled index, or `None` for an empty list.
pub fn mark_sampled(predictions: &mut [Prediction], r: f32) -> Option<usize> {
    if predictions.is_empty() {
        return None;
    }

    for p in predictions.iter_mut() {
        p.is_sampled = false;
    }

    let mut cumulative = 0.0f32;
    let mut chosen = None;
    for (i, p) in predictions.iter().enumerate() {
        if !p.in_nucleus {
            break;
        }
        cumulative += p.nucleus_probability;
        if cumulative >= r {
            chosen = Some(i);
            break;
        }
    }

    let index = chosen.unwrap_or(0);
    predictions[index].is_sampled = true;
    Some(index)
}

/// Number of nucleus members (always a prefix)
pub fn nucleus_len(predictions: &[Prediction]) -> usize {
    predictions.iter().take_while(|p| p.in_nucleus).count()
}
