use async_trait::async_trait;

use common::{
    error::RetrievalError,
    types::{Direction, Document, ExtractedEntity, GraphNode, GraphPath, TraversalResult, TraversalStrategy},
};

/// Dense-vector similarity search collaborator.
///
/// Results are ordered by descending relevance. A failure here is fatal to
/// the whole search call.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<Document>, RetrievalError>;
}

/// Knowledge-graph collaborator.
///
/// Traversal expands from `start_id` visiting each node at most once,
/// honoring the direction filter and the result-count limit. Shortest paths
/// are found with unweighted BFS; the reported cost sums edge weights and is
/// only minimal when all weights are equal.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn traverse(
        &self,
        start_id: &str,
        max_depth: usize,
        direction: Direction,
        strategy: TraversalStrategy,
        limit: usize,
    ) -> Result<TraversalResult, RetrievalError>;

    async fn shortest_path(
        &self,
        from_id: &str,
        to_id: &str,
        max_depth: usize,
    ) -> Result<GraphPath, RetrievalError>;

    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>, RetrievalError>;
}

/// Best-effort recognition of graph entities mentioned in query text.
/// An empty result is a legitimate outcome, not an error.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>, RetrievalError>;
}
