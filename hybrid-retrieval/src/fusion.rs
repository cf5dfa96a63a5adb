use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use common::types::{Document, GraphNode};

use crate::pipeline::config::{FusionStrategy, RetrieverConfig};

/// A document coming out of graph traversal, together with the nodes in its
/// immediate neighborhood. Related nodes survive fusion so the augmentation
/// phase can describe the candidate's graph context.
#[derive(Debug, Clone, Default)]
pub struct GraphCandidate {
    pub document: Document,
    pub related_nodes: Vec<GraphNode>,
}

/// Scored candidate shared by every stage downstream of fusion.
///
/// `vector_score` and `graph_score` are positional rank scores in `[0, 1]`,
/// zero when the candidate was not produced by that modality. `rank` is
/// 1-based and re-assigned on every reorder.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub document: Document,
    pub vector_score: f32,
    pub graph_score: f32,
    pub fused_score: f32,
    pub rank: usize,
    pub related_nodes: Vec<GraphNode>,
}

impl FusedResult {
    fn from_document(document: Document) -> Self {
        Self {
            document,
            vector_score: 0.0,
            graph_score: 0.0,
            fused_score: 0.0,
            rank: 0,
            related_nodes: Vec::new(),
        }
    }
}

/// Candidate identity within one fused list: the document id when present,
/// otherwise the content itself. Distinct documents with identical content
/// and no id will collide and merge.
pub fn candidate_key(document: &Document) -> String {
    if document.id.is_empty() {
        document.content.clone()
    } else {
        document.id.clone()
    }
}

pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

struct MergedCandidate {
    result: FusedResult,
    in_vector: bool,
    in_graph: bool,
}

impl MergedCandidate {
    fn new(document: Document) -> Self {
        Self {
            result: FusedResult::from_document(document),
            in_vector: false,
            in_graph: false,
        }
    }
}

/// Merge a vector-ranked list and a graph-ranked list into one list of
/// scored candidates under the configured fusion law.
///
/// Each input list is independently rank-scored by position before merging:
/// `1 - i/len` for the rank-based laws, `1/(k + i + 1)` for RRF. Candidates
/// sharing an identity key are merged, never duplicated. Output is sorted
/// descending by fused score with ranks `1..N`; equal scores keep arrival
/// order (vector arrivals before graph arrivals), so ties are deterministic
/// rather than iteration-order dependent.
pub fn fuse(
    vector_list: Vec<Document>,
    graph_list: Vec<GraphCandidate>,
    options: &RetrieverConfig,
) -> Vec<FusedResult> {
    // Insertion-ordered merge: the map finds duplicates, the order vector
    // pins a reproducible arrival order for sorting ties.
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, MergedCandidate> = HashMap::new();

    let vector_len = vector_list.len();
    for (position, document) in vector_list.into_iter().enumerate() {
        let score = positional_score(position, vector_len, options);
        let entry = entry_for(&mut merged, &mut order, document);
        entry.in_vector = true;
        if score > entry.result.vector_score {
            entry.result.vector_score = score;
        }
    }

    let graph_len = graph_list.len();
    for (position, candidate) in graph_list.into_iter().enumerate() {
        let score = positional_score(position, graph_len, options);
        let entry = entry_for(&mut merged, &mut order, candidate.document);
        entry.in_graph = true;
        if score > entry.result.graph_score {
            entry.result.graph_score = score;
        }
        merge_related_nodes(&mut entry.result.related_nodes, candidate.related_nodes);
    }

    let mut results: Vec<FusedResult> = order
        .iter()
        .filter_map(|key| merged.remove(key))
        .map(|mut candidate| {
            candidate.result.fused_score = apply_fusion_law(&candidate, options);
            candidate.result
        })
        .collect();

    sort_and_rank(&mut results);
    results
}

fn entry_for<'a>(
    merged: &'a mut HashMap<String, MergedCandidate>,
    order: &mut Vec<String>,
    document: Document,
) -> &'a mut MergedCandidate {
    let key = candidate_key(&document);
    match merged.entry(key) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            order.push(entry.key().clone());
            entry.insert(MergedCandidate::new(document))
        }
    }
}

fn merge_related_nodes(existing: &mut Vec<GraphNode>, incoming: Vec<GraphNode>) {
    for node in incoming {
        if !existing.iter().any(|known| known.id == node.id) {
            existing.push(node);
        }
    }
}

fn positional_score(position: usize, len: usize, options: &RetrieverConfig) -> f32 {
    if len == 0 {
        return 0.0;
    }
    match options.fusion_strategy {
        FusionStrategy::Rrf => 1.0 / (options.rrf_constant + position as f32 + 1.0),
        _ => 1.0 - position as f32 / len as f32,
    }
}

fn apply_fusion_law(candidate: &MergedCandidate, options: &RetrieverConfig) -> f32 {
    let vector = candidate.result.vector_score;
    let graph = candidate.result.graph_score;

    match options.fusion_strategy {
        FusionStrategy::Weighted => {
            let total = options.vector_weight + options.graph_weight;
            if total <= f32::EPSILON {
                // Both weights zero would divide by zero; fall back to Max.
                vector.max(graph)
            } else {
                clamp_unit((options.vector_weight * vector + options.graph_weight * graph) / total)
            }
        }
        FusionStrategy::Rrf => clamp_unit(vector + graph),
        FusionStrategy::Max => vector.max(graph),
        FusionStrategy::Min => {
            if candidate.in_vector && candidate.in_graph {
                // Rewards cross-modality agreement.
                vector.min(graph)
            } else {
                // Single-modality hits keep the one score they have.
                vector.max(graph)
            }
        }
    }
}

/// Sort descending by fused score and re-assign 1-based ranks. The sort is
/// stable, so equal scores keep their current order.
pub fn sort_and_rank(results: &mut [FusedResult]) {
    results.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
    });
    assign_ranks(results);
}

/// Re-assign ranks `1..N` in current order.
pub fn assign_ranks(results: &mut [FusedResult]) {
    for (index, result) in results.iter_mut().enumerate() {
        result.rank = index + 1;
    }
}
