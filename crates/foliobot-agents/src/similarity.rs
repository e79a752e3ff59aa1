use std::cmp::Ordering;

use foliobot_common::{Error, Result};
use tracing::warn;

/// Cosine similarity in [-1, 1]. A zero-magnitude vector scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Rank `candidates` against `query`, keeping at most `k` whose score is at
/// least `threshold`. Ties keep candidate order. Candidates from a different
/// embedding space are skipped.
pub fn top_k_similar<T, F>(
    query: &[f32],
    candidates: impl IntoIterator<Item = T>,
    embedding_of: F,
    k: usize,
    threshold: f32,
) -> Vec<Scored<T>>
where
    F: Fn(&T) -> &[f32],
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<Scored<T>> = candidates
        .into_iter()
        .filter_map(|item| match cosine_similarity(query, embedding_of(&item)) {
            Ok(score) if score >= threshold => Some(Scored { item, score }),
            Ok(_) => None,
            Err(e) => {
                warn!("skipping candidate during ranking: {e}");
                None
            }
        })
        .collect();

    // `sort_by` is stable.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}
