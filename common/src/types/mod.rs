pub mod document;
pub mod entity;
pub mod graph;

pub use document::Document;
pub use entity::ExtractedEntity;
pub use graph::{
    Direction, GraphEdge, GraphNode, GraphPath, TraversalResult, TraversalStrategy,
};
