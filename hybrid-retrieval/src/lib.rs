//! Hybrid retrieval engine combining vector similarity search with
//! knowledge-graph traversal.
//!
//! A [`Retriever`] owns the backend handles and per-retriever defaults.
//! Each search call resolves its options, picks the strategy driver for the
//! requested mode and runs the stage pipeline: candidate collection (vector
//! and graph branches concurrently), score fusion, reranking, context
//! augmentation and final assembly. Per-call counts and phase timings are
//! kept for inspection via [`Retriever::statistics`].

use std::sync::{Arc, RwLock};

use tracing::{info, instrument};

use common::error::RetrievalError;
use common::types::Document;

pub mod augment;
pub mod fusion;
pub mod pipeline;
pub mod rerank;
pub mod similarity;
pub mod store;

pub use common::error::RetrievalError as Error;
pub use common::types;
pub use fusion::{FusedResult, GraphCandidate};
pub use pipeline::config::{
    FusionStrategy, RerankStrategy, RetrieverConfig, SearchMode, SearchOptions,
};
pub use pipeline::statistics::{PhaseKind, PhaseTimings, SearchStatistics};
pub use store::{EntityExtractor, GraphStore, VectorStore};

use pipeline::stages::PipelineContext;

/// The retrieval engine. Cheap to share behind an `Arc`; all search state
/// lives in the per-call pipeline context.
pub struct Retriever {
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    entity_extractor: Arc<dyn EntityExtractor>,
    config: RetrieverConfig,
    last_statistics: RwLock<SearchStatistics>,
}

impl Retriever {
    /// Build a retriever over the given backends. The configuration is
    /// validated here so invalid defaults fail construction, not the first
    /// search.
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        entity_extractor: Arc<dyn EntityExtractor>,
        config: RetrieverConfig,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;
        Ok(Self {
            vector_store,
            graph_store,
            entity_extractor,
            config,
            last_statistics: RwLock::new(SearchStatistics::default()),
        })
    }

    /// Run a search and return the final documents.
    ///
    /// Dropping the returned future cancels the call; in-flight vector and
    /// graph work is dropped with it.
    pub async fn search(
        &self,
        query: &str,
        options: Option<SearchOptions>,
    ) -> Result<Vec<Document>, RetrievalError> {
        let (documents, _) = self.search_with_statistics(query, options).await?;
        Ok(documents)
    }

    /// Run a search and return the documents together with the statistics of
    /// this call.
    #[instrument(skip_all)]
    pub async fn search_with_statistics(
        &self,
        query: &str,
        options: Option<SearchOptions>,
    ) -> Result<(Vec<Document>, SearchStatistics), RetrievalError> {
        let resolved = options.unwrap_or_default().merged(&self.config);
        resolved.validate()?;

        self.store_statistics(SearchStatistics::default());

        info!(
            mode = %resolved.mode,
            k = resolved.k,
            fusion = %resolved.fusion_strategy,
            rerank = %resolved.rerank_strategy,
            query_chars = query.chars().count(),
            "Starting retrieval pipeline"
        );

        let driver = pipeline::driver_for(resolved.mode);
        let ctx = PipelineContext::new(
            self.vector_store.as_ref(),
            self.graph_store.as_ref(),
            self.entity_extractor.as_ref(),
            query,
            resolved,
        );

        let (documents, statistics) = pipeline::run(driver.as_ref(), ctx).await?;

        info!(
            returned = statistics.returned_results,
            total_ms = statistics.total.as_millis(),
            "Retrieval pipeline finished"
        );

        self.store_statistics(statistics.clone());
        Ok((documents, statistics))
    }

    /// Statistics of the most recent search call. Zeroed while no call has
    /// completed since construction or since the last failed call started.
    pub fn statistics(&self) -> SearchStatistics {
        match self.last_statistics.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_statistics(&self, statistics: SearchStatistics) {
        let mut guard = match self.last_statistics.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = statistics;
    }
}
