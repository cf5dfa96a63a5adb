use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Document;

/// A node read from the external graph store. Consumed read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub label: String,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            label: label.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Human-readable `"{label} ({type})"` tag used for related-entity lists.
    pub fn display_tag(&self) -> String {
        format!("{} ({})", self.label, self.node_type)
    }

    /// Convert the node into a retrievable document. Content is synthesized
    /// from label, type, and the `description` property; all node properties
    /// are copied into the document metadata.
    pub fn to_document(&self) -> Document {
        let mut content = self.display_tag();
        if let Some(description) = self
            .properties
            .get("description")
            .and_then(serde_json::Value::as_str)
        {
            if !description.is_empty() {
                content.push_str(": ");
                content.push_str(description);
            }
        }

        let id = if self.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.id.clone()
        };

        let mut document = Document::new(id, content);
        for (key, value) in &self.properties {
            document.metadata.insert(key.clone(), value.clone());
        }
        document.set_metadata("node_type", self.node_type.clone());
        document.set_metadata("node_label", self.label.clone());
        document
    }
}

/// A directed, optionally weighted edge between two graph nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub edge_type: String,
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
}

const fn default_edge_weight() -> f64 {
    1.0
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, edge_type: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type: edge_type.into(),
            weight: default_edge_weight(),
        }
    }

    /// The endpoint opposite to `node_id`, if the edge touches it at all.
    pub fn other_end<'a>(&'a self, node_id: &str) -> Option<&'a str> {
        if self.from == node_id {
            Some(self.to.as_str())
        } else if self.to == node_id {
            Some(self.from.as_str())
        } else {
            None
        }
    }
}

/// Direction filter for graph expansion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
    #[default]
    Both,
}

/// Expansion order used by the graph store's traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalStrategy {
    #[default]
    BreadthFirst,
    DepthFirst,
}

/// Nodes and edges visited by one traversal, each node at most once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraversalResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// A path between two nodes.
///
/// `cost` is the sum of traversed edge weights. The traversal collaborator
/// finds paths with unweighted BFS, so the cost is only minimal when all
/// edge weights are equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub hops: usize,
    pub cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_to_document_synthesizes_content_and_metadata() {
        let node = GraphNode::new("n1", "Person", "Ada Lovelace")
            .with_property("description", "first programmer")
            .with_property("born", 1815);

        let doc = node.to_document();
        assert_eq!(doc.id, "n1");
        assert_eq!(doc.content, "Ada Lovelace (Person): first programmer");
        assert_eq!(doc.metadata["born"], serde_json::json!(1815));
        assert_eq!(doc.metadata["node_label"], serde_json::json!("Ada Lovelace"));
    }

    #[test]
    fn node_without_description_keeps_tag_only() {
        let node = GraphNode::new("n2", "Topic", "Analytical Engine");
        assert_eq!(node.to_document().content, "Analytical Engine (Topic)");
    }

    #[test]
    fn node_with_empty_id_gets_a_synthetic_one() {
        let node = GraphNode::new("", "Topic", "Unnamed");
        assert!(!node.to_document().id.is_empty());
    }

    #[test]
    fn edge_other_end_resolves_both_directions() {
        let edge = GraphEdge::new("a", "b", "knows");
        assert_eq!(edge.other_end("a"), Some("b"));
        assert_eq!(edge.other_end("b"), Some("a"));
        assert_eq!(edge.other_end("c"), None);
    }
}
