use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The retrievable payload every retrieval modality produces and the fusion
/// engine operates on. `metadata` is free-form; later pipeline phases add
/// score, rank, and graph-context keys to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Fused relevance score attached by the fusion phase, if any.
    pub fn fused_score(&self) -> Option<f64> {
        self.metadata.get("fused_score").and_then(serde_json::Value::as_f64)
    }
}
