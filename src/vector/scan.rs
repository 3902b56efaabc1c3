//! In-process brute-force similarity search.

/// Cosine similarity of two vectors.
///
/// `None` when the dimensions differ, either vector is empty, or either has
/// zero magnitude. Zero vectors carry no direction and must never rank.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Score every candidate against `query` and keep the best `k` at or above
/// `threshold`, highest first.
pub fn top_k<'a, T>(
    candidates: impl IntoIterator<Item = (T, &'a [f32])>,
    query: &[f32],
    k: usize,
    threshold: f32,
) -> Vec<(T, f32)> {
    let scored = candidates
        .into_iter()
        .filter_map(|(item, vector)| cosine_similarity(query, vector).map(|s| (item, s)))
        .collect();
    finalize(scored, k, threshold)
}

/// Apply the result contract to already-scored hits: drop anything below
/// `threshold` (NaN included), sort descending, truncate to `k`.
pub fn finalize<T>(mut scored: Vec<(T, f32)>, k: usize, threshold: f32) -> Vec<(T, f32)> {
    scored.retain(|(_, score)| *score >= threshold);
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}
