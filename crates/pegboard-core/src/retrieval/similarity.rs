//! Cosine ranking of document chunks against a query embedding.

/// A chunk selected for the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// The `k` chunks most similar to `query`, best first.
pub fn top_chunks(
    query: &[f32],
    chunks: &[String],
    embeddings: &[Vec<f32>],
    k: usize,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = embeddings
        .iter()
        .zip(chunks)
        .enumerate()
        .map(|(index, (embedding, text))| ScoredChunk {
            index,
            text: text.clone(),
            score: cosine_similarity(query, embedding),
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}
