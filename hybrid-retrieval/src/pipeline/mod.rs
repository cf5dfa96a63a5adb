use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use common::{error::RetrievalError, types::Document};

pub mod config;
pub mod stages;
pub mod statistics;

use config::SearchMode;
use stages::{
    AssembleStage, AugmentStage, CollectCandidatesStage, FusionStage, GraphSearchStage,
    PipelineContext, RerankStage, VectorSearchStage,
};
use statistics::{PhaseKind, SearchStatistics};

/// One step of a search call. Stages read and mutate the shared context;
/// returning an error aborts the remaining stages.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn kind(&self) -> PhaseKind;

    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), RetrievalError>;
}

pub type BoxedStage = Box<dyn PipelineStage>;

/// A search mode expressed as an ordered stage list.
pub trait StrategyDriver: Send + Sync {
    fn stages(&self) -> Vec<BoxedStage>;

    fn finalize(&self, ctx: &mut PipelineContext<'_>) -> Result<Vec<Document>, RetrievalError> {
        Ok(std::mem::take(&mut ctx.documents))
    }
}

/// Full pipeline: fork-join collection, fusion, reranking, augmentation.
pub struct HybridDriver;

impl StrategyDriver for HybridDriver {
    fn stages(&self) -> Vec<BoxedStage> {
        vec![
            Box::new(CollectCandidatesStage),
            Box::new(FusionStage),
            Box::new(RerankStage),
            Box::new(AugmentStage),
            Box::new(AssembleStage),
        ]
    }
}

/// Vector similarity only, store ranking preserved.
pub struct VectorOnlyDriver;

impl StrategyDriver for VectorOnlyDriver {
    fn stages(&self) -> Vec<BoxedStage> {
        vec![Box::new(VectorSearchStage), Box::new(AssembleStage)]
    }
}

/// Entity extraction and traversal only, nodes returned as documents.
pub struct GraphOnlyDriver;

impl StrategyDriver for GraphOnlyDriver {
    fn stages(&self) -> Vec<BoxedStage> {
        vec![Box::new(GraphSearchStage), Box::new(AssembleStage)]
    }
}

pub fn driver_for(mode: SearchMode) -> Box<dyn StrategyDriver> {
    match mode {
        SearchMode::Hybrid => Box::new(HybridDriver),
        SearchMode::Vector => Box::new(VectorOnlyDriver),
        SearchMode::Graph => Box::new(GraphOnlyDriver),
    }
}

/// Run every stage of the driver in order, timing each one, and finalize
/// into the outgoing document list plus the statistics of this call.
pub async fn run(
    driver: &dyn StrategyDriver,
    mut ctx: PipelineContext<'_>,
) -> Result<(Vec<Document>, SearchStatistics), RetrievalError> {
    let started = Instant::now();

    for stage in driver.stages() {
        let stage_started = Instant::now();
        stage.execute(&mut ctx).await?;
        let elapsed = stage_started.elapsed();
        debug!(phase = ?stage.kind(), elapsed_ms = elapsed.as_millis(), "Pipeline stage completed");
        ctx.statistics.timings.record(stage.kind(), elapsed);
    }

    let documents = driver.finalize(&mut ctx)?;
    ctx.statistics.returned_results = documents.len();
    ctx.statistics.total = started.elapsed();

    Ok((documents, ctx.statistics))
}
