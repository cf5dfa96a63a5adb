use tracing::debug;

use crate::fusion::{assign_ranks, FusedResult};
use crate::pipeline::config::{RerankStrategy, RetrieverConfig};
use crate::similarity::{jaccard_of_tokens, token_set};

/// Reorder fused candidates under the configured reranking law.
///
/// Expects candidates in fusion order (descending fused score); the
/// top-scored candidate seeds both greedy laws. Diversity places every
/// candidate, MMR stops once `k` are selected. Ranks are re-assigned
/// `1..N` in the returned order. Both greedy laws break ties toward the
/// earlier candidate in fusion order, which keeps the output deterministic.
pub fn rerank(
    candidates: Vec<FusedResult>,
    query: &str,
    options: &RetrieverConfig,
) -> Vec<FusedResult> {
    debug!(
        query_chars = query.chars().count(),
        strategy = %options.rerank_strategy,
        candidate_count = candidates.len(),
        "Reranking fused candidates"
    );

    let mut reordered = match options.rerank_strategy {
        RerankStrategy::Score => candidates,
        RerankStrategy::Diversity => diversity_rerank(candidates),
        RerankStrategy::Mmr => mmr_rerank(candidates, options.mmr_lambda, options.k),
    };

    assign_ranks(&mut reordered);
    reordered
}

/// Greedy farthest-first: repeatedly pick the remaining candidate whose
/// distance to its nearest already-selected neighbor is the largest.
///
/// Candidates are tokenized once, and each one's nearest-selected distance
/// is cached and updated only against the newest selection, bounding the
/// whole pass at O(n²) set comparisons.
fn diversity_rerank(mut candidates: Vec<FusedResult>) -> Vec<FusedResult> {
    if candidates.len() <= 1 {
        return candidates;
    }

    let mut tokens: Vec<_> = candidates
        .iter()
        .map(|candidate| token_set(&candidate.document.content))
        .collect();

    let mut selected = Vec::with_capacity(candidates.len());
    selected.push(candidates.remove(0));
    let mut newest_tokens = tokens.remove(0);

    let mut nearest_distance: Vec<f32> = tokens
        .iter()
        .map(|candidate_tokens| 1.0 - jaccard_of_tokens(candidate_tokens, &newest_tokens))
        .collect();

    while !candidates.is_empty() {
        let mut best_index = 0;
        let mut best_distance = f32::MIN;

        for (index, &distance) in nearest_distance.iter().enumerate() {
            // Strict comparison: ties go to the earlier fusion rank.
            if distance > best_distance {
                best_distance = distance;
                best_index = index;
            }
        }

        selected.push(candidates.remove(best_index));
        newest_tokens = tokens.remove(best_index);
        nearest_distance.remove(best_index);

        for (index, entry) in nearest_distance.iter_mut().enumerate() {
            let distance = 1.0 - jaccard_of_tokens(&tokens[index], &newest_tokens);
            if distance < *entry {
                *entry = distance;
            }
        }
    }

    selected
}

/// Maximal Marginal Relevance: pick the candidate maximizing
/// `lambda * fused_score - (1 - lambda) * max_similarity(candidate, selected)`
/// until `k` candidates are selected or none remain. Same caching scheme as
/// the diversity law, tracking the max similarity instead of the min
/// distance.
fn mmr_rerank(mut candidates: Vec<FusedResult>, lambda: f32, k: usize) -> Vec<FusedResult> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut tokens: Vec<_> = candidates
        .iter()
        .map(|candidate| token_set(&candidate.document.content))
        .collect();

    let mut selected = Vec::with_capacity(k.min(candidates.len()));
    selected.push(candidates.remove(0));
    let mut newest_tokens = tokens.remove(0);

    let mut max_similarity: Vec<f32> = tokens
        .iter()
        .map(|candidate_tokens| jaccard_of_tokens(candidate_tokens, &newest_tokens))
        .collect();

    while !candidates.is_empty() && selected.len() < k {
        let mut best_index = 0;
        let mut best_marginal = f32::MIN;

        for (index, candidate) in candidates.iter().enumerate() {
            let marginal =
                lambda * candidate.fused_score - (1.0 - lambda) * max_similarity[index];
            if marginal > best_marginal {
                best_marginal = marginal;
                best_index = index;
            }
        }

        selected.push(candidates.remove(best_index));
        newest_tokens = tokens.remove(best_index);
        max_similarity.remove(best_index);

        for (index, entry) in max_similarity.iter_mut().enumerate() {
            let similarity = jaccard_of_tokens(&tokens[index], &newest_tokens);
            if similarity > *entry {
                *entry = similarity;
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::Document;

    fn candidate(id: &str, content: &str, fused_score: f32) -> FusedResult {
        FusedResult {
            document: Document::new(id, content),
            vector_score: fused_score,
            graph_score: 0.0,
            fused_score,
            rank: 0,
            related_nodes: Vec::new(),
        }
    }

    fn sample_candidates() -> Vec<FusedResult> {
        vec![
            candidate("d1", "rust async runtime internals", 0.9),
            candidate("d2", "rust async runtime internals explained", 0.8),
            candidate("d3", "gardening tips for winter squash", 0.7),
        ]
    }

    fn options(strategy: RerankStrategy, lambda: f32, k: usize) -> RetrieverConfig {
        RetrieverConfig {
            rerank_strategy: strategy,
            mmr_lambda: lambda,
            k,
            ..RetrieverConfig::default()
        }
    }

    #[test]
    fn score_law_keeps_fusion_order() {
        let reranked = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Score, 0.5, 10),
        );
        let ids: Vec<&str> = reranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn ranks_are_reassigned_after_reordering() {
        let reranked = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Diversity, 0.5, 10),
        );
        for (index, result) in reranked.iter().enumerate() {
            assert_eq!(result.rank, index + 1);
        }
    }

    #[test]
    fn diversity_prefers_the_dissimilar_candidate_second() {
        let reranked = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Diversity, 0.5, 10),
        );
        let ids: Vec<&str> = reranked.iter().map(|r| r.document.id.as_str()).collect();
        // d3 shares no words with the seed, d2 nearly duplicates it.
        assert_eq!(ids, vec!["d1", "d3", "d2"]);
        assert_eq!(reranked.len(), 3, "diversity must place every candidate");
    }

    #[test]
    fn mmr_with_lambda_one_equals_score_order() {
        let score_order = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Score, 1.0, 10),
        );
        let mmr_order = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Mmr, 1.0, 10),
        );

        let score_ids: Vec<&str> = score_order.iter().map(|r| r.document.id.as_str()).collect();
        let mmr_ids: Vec<&str> = mmr_order.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(score_ids, mmr_ids);
    }

    #[test]
    fn mmr_with_lambda_zero_seeds_by_score_then_maximizes_dissimilarity() {
        let reranked = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Mmr, 0.0, 10),
        );
        let ids: Vec<&str> = reranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids[0], "d1", "first selection stays score-driven");
        assert_eq!(ids[1], "d3", "subsequent picks prefer dissimilarity");
    }

    #[test]
    fn mmr_stops_at_k() {
        let reranked = rerank(
            sample_candidates(),
            "rust",
            &options(RerankStrategy::Mmr, 0.5, 2),
        );
        assert_eq!(reranked.len(), 2);
    }

    #[test]
    fn diversity_cache_matches_exhaustive_recomputation() {
        use crate::similarity::jaccard_similarity;

        let candidates = vec![
            candidate("d1", "rust async runtime internals", 0.9),
            candidate("d2", "rust async runtime internals explained", 0.8),
            candidate("d3", "gardening tips for winter squash", 0.7),
            candidate("d4", "winter squash gardening guide", 0.6),
            candidate("d5", "async rust task scheduling", 0.5),
        ];

        // Reference selection recomputing every pair on every step.
        let mut remaining = candidates.clone();
        let mut expected = vec![remaining.remove(0)];
        while !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_distance = f32::MIN;
            for (index, candidate) in remaining.iter().enumerate() {
                let nearest = expected
                    .iter()
                    .map(|chosen| {
                        1.0 - jaccard_similarity(
                            &candidate.document.content,
                            &chosen.document.content,
                        )
                    })
                    .fold(f32::MAX, f32::min);
                if nearest > best_distance {
                    best_distance = nearest;
                    best_index = index;
                }
            }
            expected.push(remaining.remove(best_index));
        }

        let reranked = rerank(candidates, "rust", &options(RerankStrategy::Diversity, 0.5, 10));

        let expected_ids: Vec<&str> = expected.iter().map(|r| r.document.id.as_str()).collect();
        let actual_ids: Vec<&str> = reranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(actual_ids, expected_ids);
    }

    #[test]
    fn mmr_cache_matches_exhaustive_recomputation() {
        use crate::similarity::jaccard_similarity;

        let lambda = 0.4f32;
        let candidates = vec![
            candidate("d1", "rust async runtime internals", 0.9),
            candidate("d2", "rust async runtime internals explained", 0.8),
            candidate("d3", "gardening tips for winter squash", 0.7),
            candidate("d4", "winter squash gardening guide", 0.6),
            candidate("d5", "async rust task scheduling", 0.5),
        ];

        let mut remaining = candidates.clone();
        let mut expected = vec![remaining.remove(0)];
        while !remaining.is_empty() {
            let mut best_index = 0;
            let mut best_marginal = f32::MIN;
            for (index, candidate) in remaining.iter().enumerate() {
                let max_similarity = expected
                    .iter()
                    .map(|chosen| {
                        jaccard_similarity(&candidate.document.content, &chosen.document.content)
                    })
                    .fold(0.0f32, f32::max);
                let marginal =
                    lambda * candidate.fused_score - (1.0 - lambda) * max_similarity;
                if marginal > best_marginal {
                    best_marginal = marginal;
                    best_index = index;
                }
            }
            expected.push(remaining.remove(best_index));
        }

        let reranked = rerank(candidates, "rust", &options(RerankStrategy::Mmr, lambda, 10));

        let expected_ids: Vec<&str> = expected.iter().map(|r| r.document.id.as_str()).collect();
        let actual_ids: Vec<&str> = reranked.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(actual_ids, expected_ids);
    }

    #[test]
    fn reranking_is_deterministic() {
        let run = || {
            rerank(
                sample_candidates(),
                "rust",
                &options(RerankStrategy::Mmr, 0.4, 10),
            )
            .into_iter()
            .map(|r| r.document.id)
            .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn empty_input_is_preserved() {
        assert!(rerank(Vec::new(), "rust", &options(RerankStrategy::Mmr, 0.5, 5)).is_empty());
    }
}
