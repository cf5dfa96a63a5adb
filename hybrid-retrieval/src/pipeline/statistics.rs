use std::time::Duration;

use serde::Serialize;

/// Pipeline phase identifiers used for per-phase timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// The fork-join stage running vector search and the graph branch.
    CollectCandidates,
    VectorSearch,
    EntityExtraction,
    GraphTraversal,
    Fusion,
    Rerank,
    Augment,
    Assemble,
}

/// Elapsed time per executed phase, in execution order.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PhaseTimings {
    timings: Vec<(PhaseKind, Duration)>,
}

impl PhaseTimings {
    pub fn record(&mut self, kind: PhaseKind, duration: Duration) {
        self.timings.push((kind, duration));
    }

    pub fn as_slice(&self) -> &[(PhaseKind, Duration)] {
        &self.timings
    }

    fn get_ms(&self, kind: PhaseKind) -> u128 {
        self.timings
            .iter()
            .find(|(recorded, _)| *recorded == kind)
            .map_or(0, |(_, duration)| duration.as_millis())
    }

    pub fn vector_search_ms(&self) -> u128 {
        self.get_ms(PhaseKind::VectorSearch)
    }

    pub fn entity_extraction_ms(&self) -> u128 {
        self.get_ms(PhaseKind::EntityExtraction)
    }

    pub fn graph_traversal_ms(&self) -> u128 {
        self.get_ms(PhaseKind::GraphTraversal)
    }

    pub fn fusion_ms(&self) -> u128 {
        self.get_ms(PhaseKind::Fusion)
    }

    pub fn rerank_ms(&self) -> u128 {
        self.get_ms(PhaseKind::Rerank)
    }

    pub fn augment_ms(&self) -> u128 {
        self.get_ms(PhaseKind::Augment)
    }
}

/// Per-call result counts and phase timings. Reset at the start of every
/// search call; purely observational, never persisted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SearchStatistics {
    pub vector_results: usize,
    pub entities_extracted: usize,
    pub nodes_traversed: usize,
    pub graph_results: usize,
    pub fused_results: usize,
    pub returned_results: usize,
    pub timings: PhaseTimings,
    pub total: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_phases_are_readable_by_kind() {
        let mut timings = PhaseTimings::default();
        timings.record(PhaseKind::VectorSearch, Duration::from_millis(12));
        timings.record(PhaseKind::Fusion, Duration::from_millis(3));

        assert_eq!(timings.vector_search_ms(), 12);
        assert_eq!(timings.fusion_ms(), 3);
        assert_eq!(timings.rerank_ms(), 0);
        assert_eq!(timings.as_slice().len(), 2);
    }

    #[test]
    fn statistics_serialize_to_json() {
        let mut statistics = SearchStatistics::default();
        statistics.vector_results = 4;
        statistics
            .timings
            .record(PhaseKind::Rerank, Duration::from_millis(1));

        let value = serde_json::to_value(&statistics).expect("serializable");
        assert_eq!(value["vector_results"], serde_json::json!(4));
    }
}
