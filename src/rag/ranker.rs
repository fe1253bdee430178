use std::cmp::Ordering;

use super::index::IndexEntry;

/// A descriptor with its relevance to the question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub text: String,
    pub score: f32,
}

/// Cosine similarity over the shorter of the two lengths.
///
/// Zero whenever either side has zero norm, which covers empty vectors
/// (no embedding backend) without a division by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

/// Scores every entry, highest first. Ties keep index order.
pub fn score_entries(question: &[f32], index: &[IndexEntry]) -> Vec<RetrievalResult> {
    let mut scored: Vec<RetrievalResult> = index
        .iter()
        .map(|entry| RetrievalResult {
            text: entry.text.clone(),
            score: cosine_similarity(question, &entry.vector),
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
}

/// Top-`top_k` descriptor texts for the question vector.
pub fn rank(question: &[f32], index: &[IndexEntry], top_k: usize) -> Vec<String> {
    score_entries(question, index)
        .into_iter()
        .take(top_k)
        .map(|r| r.text)
        .collect()
}
