use std::fmt;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use common::error::RetrievalError;

/// Which retrieval modalities a search call runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Vector search and graph traversal fused into one ranked list.
    #[default]
    Hybrid,
    /// Vector similarity search only.
    Vector,
    /// Entity extraction plus graph traversal only.
    Graph,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "vector" => Ok(Self::Vector),
            "graph" => Ok(Self::Graph),
            other => Err(format!("unknown search mode '{other}'")),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hybrid => "hybrid",
            Self::Vector => "vector",
            Self::Graph => "graph",
        };
        f.write_str(label)
    }
}

/// Law used to combine the two ranked lists into one fused score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weight-normalized linear combination of the two rank scores.
    #[default]
    Weighted,
    /// Reciprocal rank fusion: `1/(k + rank)` summed across lists.
    Rrf,
    /// The better of the two rank scores.
    Max,
    /// The worse of the two for cross-modality hits; single-modality hits
    /// keep the one score they have.
    Min,
}

impl fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Weighted => "weighted",
            Self::Rrf => "rrf",
            Self::Max => "max",
            Self::Min => "min",
        };
        f.write_str(label)
    }
}

/// Law used to reorder fused candidates before truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    /// Keep fusion order.
    #[default]
    Score,
    /// Greedy farthest-first reordering toward textual diversity.
    Diversity,
    /// Maximal Marginal Relevance under `mmr_lambda`.
    Mmr,
}

impl fmt::Display for RerankStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Score => "score",
            Self::Diversity => "diversity",
            Self::Mmr => "mmr",
        };
        f.write_str(label)
    }
}

/// Retriever-level defaults for every tunable the pipeline reads.
///
/// Validated once at retriever construction; per-call `SearchOptions`
/// override individual fields and the merged value is what a call runs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub mode: SearchMode,
    /// Result cap, must be >= 1.
    pub k: usize,
    /// Weight of the vector modality under the weighted law, in `[0, 1]`.
    pub vector_weight: f32,
    /// Weight of the graph modality under the weighted law, in `[0, 1]`.
    pub graph_weight: f32,
    /// Traversal depth per extracted entity, must be >= 1.
    pub max_traverse_depth: usize,
    pub fusion_strategy: FusionStrategy,
    pub rerank_strategy: RerankStrategy,
    pub enable_context_augmentation: bool,
    /// Post-fusion score floor. Documents without a fused score pass it.
    pub min_score: f32,
    /// MMR relevance/diversity trade-off, in `[0, 1]`.
    pub mmr_lambda: f32,
    /// RRF `k` constant, must be > 0.
    pub rrf_constant: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            k: 10,
            vector_weight: 0.7,
            graph_weight: 0.3,
            max_traverse_depth: 2,
            fusion_strategy: FusionStrategy::default(),
            rerank_strategy: RerankStrategy::default(),
            enable_context_augmentation: true,
            min_score: 0.0,
            mmr_lambda: 0.5,
            rrf_constant: 60.0,
        }
    }
}

impl RetrieverConfig {
    /// Load defaults from an optional `retrieval` config file plus
    /// `RETRIEVAL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("retrieval").required(false))
            .add_source(Environment::with_prefix("RETRIEVAL"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.k < 1 {
            return Err(RetrievalError::Validation(
                "k must be at least 1".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(RetrievalError::Validation(format!(
                "vector_weight must be within [0, 1], got {}",
                self.vector_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.graph_weight) {
            return Err(RetrievalError::Validation(format!(
                "graph_weight must be within [0, 1], got {}",
                self.graph_weight
            )));
        }
        if self.max_traverse_depth < 1 {
            return Err(RetrievalError::Validation(
                "max_traverse_depth must be at least 1".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err(RetrievalError::Validation(format!(
                "mmr_lambda must be within [0, 1], got {}",
                self.mmr_lambda
            )));
        }
        if self.rrf_constant <= 0.0 {
            return Err(RetrievalError::Validation(format!(
                "rrf_constant must be positive, got {}",
                self.rrf_constant
            )));
        }
        Ok(())
    }
}

/// Per-call overrides. Unset fields fall back to the retriever defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub mode: Option<SearchMode>,
    pub k: Option<usize>,
    pub vector_weight: Option<f32>,
    pub graph_weight: Option<f32>,
    pub max_traverse_depth: Option<usize>,
    pub fusion_strategy: Option<FusionStrategy>,
    pub rerank_strategy: Option<RerankStrategy>,
    pub enable_context_augmentation: Option<bool>,
    pub min_score: Option<f32>,
    pub mmr_lambda: Option<f32>,
    pub rrf_constant: Option<f32>,
}

impl SearchOptions {
    /// Fill unset fields from the retriever defaults.
    pub fn merged(self, defaults: &RetrieverConfig) -> RetrieverConfig {
        RetrieverConfig {
            mode: self.mode.unwrap_or(defaults.mode),
            k: self.k.unwrap_or(defaults.k),
            vector_weight: self.vector_weight.unwrap_or(defaults.vector_weight),
            graph_weight: self.graph_weight.unwrap_or(defaults.graph_weight),
            max_traverse_depth: self
                .max_traverse_depth
                .unwrap_or(defaults.max_traverse_depth),
            fusion_strategy: self.fusion_strategy.unwrap_or(defaults.fusion_strategy),
            rerank_strategy: self.rerank_strategy.unwrap_or(defaults.rerank_strategy),
            enable_context_augmentation: self
                .enable_context_augmentation
                .unwrap_or(defaults.enable_context_augmentation),
            min_score: self.min_score.unwrap_or(defaults.min_score),
            mmr_lambda: self.mmr_lambda.unwrap_or(defaults.mmr_lambda),
            rrf_constant: self.rrf_constant.unwrap_or(defaults.rrf_constant),
        }
    }
}
