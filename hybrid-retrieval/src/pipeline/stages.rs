use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument, warn};

use common::{
    error::RetrievalError,
    types::{Direction, Document, GraphNode, TraversalStrategy},
};

use crate::augment::augment;
use crate::fusion::{fuse, FusedResult, GraphCandidate};
use crate::rerank::rerank;
use crate::store::{EntityExtractor, GraphStore, VectorStore};

use super::config::RetrieverConfig;
use super::statistics::{PhaseKind, SearchStatistics};
use super::PipelineStage;

/// Upper bound on concurrent per-entity traversals.
const MAX_CONCURRENT_TRAVERSALS: usize = 4;

/// Mutable state threaded through the stages of one search call.
pub struct PipelineContext<'a> {
    pub vector_store: &'a dyn VectorStore,
    pub graph_store: &'a dyn GraphStore,
    pub entity_extractor: &'a dyn EntityExtractor,
    pub query: &'a str,
    pub options: RetrieverConfig,
    pub vector_candidates: Vec<Document>,
    pub graph_candidates: Vec<GraphCandidate>,
    pub fused: Vec<FusedResult>,
    pub documents: Vec<Document>,
    pub statistics: SearchStatistics,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        vector_store: &'a dyn VectorStore,
        graph_store: &'a dyn GraphStore,
        entity_extractor: &'a dyn EntityExtractor,
        query: &'a str,
        options: RetrieverConfig,
    ) -> Self {
        Self {
            vector_store,
            graph_store,
            entity_extractor,
            query,
            options,
            vector_candidates: Vec::new(),
            graph_candidates: Vec::new(),
            fused: Vec::new(),
            documents: Vec::new(),
            statistics: SearchStatistics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollectCandidatesStage;

#[async_trait]
impl PipelineStage for CollectCandidatesStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::CollectCandidates
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        collect_candidates(ctx).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VectorSearchStage;

#[async_trait]
impl PipelineStage for VectorSearchStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::VectorSearch
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        vector_search(ctx).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GraphSearchStage;

#[async_trait]
impl PipelineStage for GraphSearchStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::CollectCandidates
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        graph_search(ctx).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FusionStage;

#[async_trait]
impl PipelineStage for FusionStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Fusion
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        fuse_candidates(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RerankStage;

#[async_trait]
impl PipelineStage for RerankStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Rerank
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        rerank_candidates(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AugmentStage;

#[async_trait]
impl PipelineStage for AugmentStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Augment
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        augment_candidates(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssembleStage;

#[async_trait]
impl PipelineStage for AssembleStage {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Assemble
    }

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
        assemble(ctx);
        Ok(())
    }
}

/// Hybrid candidate collection: vector search and the entity-extraction →
/// graph-traversal branch run concurrently; fusion blocks on both. A vector
/// failure is fatal, graph-branch failures degrade to an empty node set.
#[instrument(level = "trace", skip_all)]
async fn collect_candidates(ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
    // Hybrid over-fetches so fusion has something to merge before truncation.
    let fetch_k = ctx.options.k.saturating_mul(2).max(1);
    let vector_store = ctx.vector_store;
    let graph_store = ctx.graph_store;
    let entity_extractor = ctx.entity_extractor;
    let query = ctx.query;
    let max_depth = ctx.options.max_traverse_depth;

    debug!(fetch_k, "Collecting candidates from vector and graph modalities");

    let vector_branch = async {
        let started = Instant::now();
        let result = vector_store.similarity_search(query, fetch_k).await;
        (result, started.elapsed())
    };
    let graph_branch = run_graph_branch(
        graph_store,
        entity_extractor,
        query,
        max_depth,
        fetch_k,
        false,
    );

    let ((vector_result, vector_elapsed), graph_result) = tokio::join!(vector_branch, graph_branch);

    let vector_documents = vector_result?;
    let graph = graph_result?;
    ctx.statistics
        .timings
        .record(PhaseKind::VectorSearch, vector_elapsed);
    ctx.statistics.vector_results = vector_documents.len();
    ctx.vector_candidates = vector_documents;

    record_graph_branch(&mut ctx.statistics, &graph);
    ctx.graph_candidates = graph.candidates;

    debug!(
        vector_candidates = ctx.vector_candidates.len(),
        graph_candidates = ctx.graph_candidates.len(),
        "Hybrid retrieval initial candidate counts"
    );

    Ok(())
}

/// Vector-only collection: top `k` straight from the store.
#[instrument(level = "trace", skip_all)]
async fn vector_search(ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
    let documents = ctx
        .vector_store
        .similarity_search(ctx.query, ctx.options.k)
        .await?;
    ctx.statistics.vector_results = documents.len();
    ctx.documents = documents;
    Ok(())
}

/// Graph-only collection. Unlike the hybrid branch, a traversal failure that
/// leaves no nodes at all fails the call.
#[instrument(level = "trace", skip_all)]
async fn graph_search(ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError> {
    let fetch_k = ctx.options.k.saturating_mul(2).max(1);
    let graph = run_graph_branch(
        ctx.graph_store,
        ctx.entity_extractor,
        ctx.query,
        ctx.options.max_traverse_depth,
        fetch_k,
        true,
    )
    .await?;

    record_graph_branch(&mut ctx.statistics, &graph);

    ctx.documents = graph
        .candidates
        .into_iter()
        .map(|candidate| candidate.document)
        .collect();
    Ok(())
}

fn fuse_candidates(ctx: &mut PipelineContext<'_>) {
    let vector = std::mem::take(&mut ctx.vector_candidates);
    let graph = std::mem::take(&mut ctx.graph_candidates);
    ctx.fused = fuse(vector, graph, &ctx.options);
    ctx.statistics.fused_results = ctx.fused.len();
}

fn rerank_candidates(ctx: &mut PipelineContext<'_>) {
    let fused = std::mem::take(&mut ctx.fused);
    ctx.fused = rerank(fused, ctx.query, &ctx.options);
}

fn augment_candidates(ctx: &mut PipelineContext<'_>) {
    let fused = std::mem::take(&mut ctx.fused);
    ctx.documents = augment(fused, &ctx.options);
}

/// Apply the post-fusion score floor and the result cap. Documents without
/// a fused score (single-modality paths) pass the floor unconditionally.
fn assemble(ctx: &mut PipelineContext<'_>) {
    let min_score = f64::from(ctx.options.min_score);
    ctx.documents.retain(|document| {
        document
            .fused_score()
            .map_or(true, |score| score >= min_score)
    });
    ctx.documents.truncate(ctx.options.k.max(1));
}

struct GraphBranch {
    candidates: Vec<GraphCandidate>,
    entities_extracted: usize,
    nodes_traversed: usize,
    extraction_elapsed: Duration,
    traversal_elapsed: Duration,
}

fn record_graph_branch(statistics: &mut SearchStatistics, graph: &GraphBranch) {
    statistics
        .timings
        .record(PhaseKind::EntityExtraction, graph.extraction_elapsed);
    statistics
        .timings
        .record(PhaseKind::GraphTraversal, graph.traversal_elapsed);
    statistics.entities_extracted = graph.entities_extracted;
    statistics.nodes_traversed = graph.nodes_traversed;
    statistics.graph_results = graph.candidates.len();
}

/// Extract entities from the query and fan traversal out across them with a
/// bounded worker pool. Degradable failures (per [`RetrievalError::is_fatal`])
/// never abort the other seeds; fatal-class errors propagate. In `strict`
/// mode a branch where every traversal failed is an error of its own.
async fn run_graph_branch(
    graph_store: &dyn GraphStore,
    entity_extractor: &dyn EntityExtractor,
    query: &str,
    max_depth: usize,
    limit: usize,
    strict: bool,
) -> Result<GraphBranch, RetrievalError> {
    let extraction_started = Instant::now();
    let entities = match entity_extractor.extract(query).await {
        Ok(entities) => entities,
        Err(error) => {
            if error.is_fatal() {
                return Err(error);
            }
            warn!(%error, "Entity extraction failed; continuing without graph context");
            Vec::new()
        }
    };
    let extraction_elapsed = extraction_started.elapsed();
    let entities_extracted = entities.len();

    // Traverse each distinct entity once.
    let mut seen_entities = HashSet::new();
    let entity_ids: Vec<String> = entities
        .into_iter()
        .map(|entity| entity.id)
        .filter(|id| seen_entities.insert(id.clone()))
        .collect();

    let traversal_started = Instant::now();
    let traversals: Vec<_> = futures::stream::iter(entity_ids.into_iter().map(|entity_id| {
        async move {
            let result = graph_store
                .traverse(
                    &entity_id,
                    max_depth,
                    Direction::Both,
                    TraversalStrategy::BreadthFirst,
                    limit,
                )
                .await;
            (entity_id, result)
        }
    }))
    .buffered(MAX_CONCURRENT_TRAVERSALS)
    .collect()
    .await;

    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut edges = Vec::new();
    let mut seen_nodes = HashSet::new();
    let mut nodes_traversed = 0usize;
    let mut traversal_failures = 0usize;
    let mut succeeded = 0usize;

    // Completed traversals are consumed in seed order, so de-duplication is
    // first-seen and reproducible.
    for (entity_id, result) in traversals {
        match result {
            Ok(traversal) => {
                succeeded += 1;
                nodes_traversed += traversal.nodes.len();
                for node in traversal.nodes {
                    if seen_nodes.insert(node.id.clone()) {
                        nodes.push(node);
                    }
                }
                edges.extend(traversal.edges);
            }
            Err(error) => {
                if error.is_fatal() {
                    return Err(error);
                }
                traversal_failures += 1;
                warn!(%error, entity_id = %entity_id, "Graph traversal failed for entity");
            }
        }
    }

    if strict && succeeded == 0 && traversal_failures > 0 {
        return Err(RetrievalError::GraphStore(
            "graph traversal failed for every extracted entity".to_owned(),
        ));
    }

    Ok(GraphBranch {
        candidates: build_graph_candidates(nodes, &edges),
        entities_extracted,
        nodes_traversed,
        extraction_elapsed,
        traversal_elapsed: traversal_started.elapsed(),
    })
}

/// Convert traversal output into graph candidates, wiring each node to its
/// neighbors within the visited set so augmentation can describe them.
fn build_graph_candidates(nodes: Vec<GraphNode>, edges: &[common::types::GraphEdge]) -> Vec<GraphCandidate> {
    let node_index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.as_str(), index))
        .collect();

    nodes
        .iter()
        .map(|node| {
            let mut related: Vec<GraphNode> = Vec::new();
            for edge in edges {
                let Some(other_id) = edge.other_end(&node.id) else {
                    continue;
                };
                // Self-loops and edges to unvisited nodes add no context.
                if other_id == node.id {
                    continue;
                }
                if let Some(&neighbor) = node_index.get(other_id) {
                    if !related.iter().any(|known| known.id == other_id) {
                        related.push(nodes[neighbor].clone());
                    }
                }
            }
            GraphCandidate {
                document: node.to_document(),
                related_nodes: related,
            }
        })
        .collect()
}
