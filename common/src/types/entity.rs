use serde::{Deserialize, Serialize};

/// Candidate graph entity recognized in query text by the entity-extractor
/// collaborator. Extraction is best-effort; an empty result is legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
}

impl ExtractedEntity {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: entity_type.into(),
        }
    }
}
