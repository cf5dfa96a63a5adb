use std::collections::HashSet;

/// Jaccard similarity over lowercased, punctuation-stripped, whitespace
/// tokenized words.
///
/// Symmetric, always in `[0, 1]`, and `0.0` whenever either side tokenizes
/// to the empty set. Cheap enough for the O(n²) call pattern the reranking
/// loops produce.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    jaccard_of_tokens(&token_set(a), &token_set(b))
}

/// Jaccard over pre-tokenized sets. The reranking loops tokenize each
/// candidate once up front and compare sets from there, which keeps the
/// per-request cost at O(n²) set comparisons instead of O(n³) with repeated
/// tokenization.
pub fn jaccard_of_tokens(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }

    intersection as f32 / union as f32
}

pub fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}
