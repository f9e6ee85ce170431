//! Vector similarity and rank fusion.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Reciprocal Rank Fusion (RRF) for merging ranked result lists

use std::collections::HashMap;

/// Standard RRF constant.
pub const RRF_K: u32 = 60;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the vectors differ in length or either is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank candidate embeddings by cosine similarity to `query`.
///
/// `candidates` yields `(id, embedding)`. Only positive similarities are
/// kept. Returns ids, most similar first.
pub fn vector_rank<'a, I>(candidates: I, query: &[f32]) -> Vec<usize>
where
    I: IntoIterator<Item = (usize, &'a [f32])>,
{
    if query.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .map(|(id, embedding)| (id, cosine_similarity(embedding, query)))
        .filter(|(_, sim)| *sim > 0.0)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(id, _)| id).collect()
}

/// Reciprocal Rank Fusion: merge several ranked id lists.
///
/// Each id's score is the sum of `1 / (k + rank)` (rank from 1) across the
/// lists it appears in. Returns `(id, score)` sorted by descending score,
/// ties broken by id, truncated to `limit`.
pub fn reciprocal_rank_fusion(rankings: &[Vec<usize>], k: u32, limit: usize) -> Vec<(usize, f32)> {
    let k = k as f32;
    let mut scores: HashMap<usize, f32> = HashMap::new();

    for ranking in rankings {
        for (rank, id) in ranking.iter().enumerate() {
            *scores.entry(*id).or_default() += 1.0 / (k + rank as f32 + 1.0);
        }
    }

    let mut results: Vec<(usize, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_or_empty() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn vector_rank_orders_by_similarity() {
        let a = [1.0, 0.0];
        let b = [0.7, 0.7];
        let c = [-1.0, 0.0];
        let ranked = vector_rank([(0, &a[..]), (1, &b[..]), (2, &c[..])], &[1.0, 0.1]);
        assert_eq!(ranked, vec![0, 1]);
    }

    #[test]
    fn vector_rank_empty_query() {
        let a = [1.0, 0.0];
        assert!(vector_rank([(0, &a[..])], &[]).is_empty());
    }

    #[test]
    fn rrf_rewards_agreement() {
        // 2 ranks well in both lists, 1 and 3 in only one each.
        let fused = reciprocal_rank_fusion(&[vec![1, 2], vec![2, 3]], RRF_K, 10);
        assert_eq!(fused[0].0, 2);
        assert_eq!(fused.len(), 3);
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn rrf_respects_limit() {
        let fused = reciprocal_rank_fusion(&[vec![0, 1, 2, 3, 4]], RRF_K, 2);
        assert_eq!(fused.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn rrf_empty() {
        assert!(reciprocal_rank_fusion(&[], RRF_K, 5).is_empty());
    }
}
