use serde_json::json;

use common::types::Document;

use crate::fusion::FusedResult;
use crate::pipeline::config::RetrieverConfig;

const RELATED_ENTITIES_HEADER: &str = "Related Entities:";
const AUGMENTED_FLAG: &str = "context_augmented";

/// Turn ranked candidates into final documents, attaching score and rank
/// metadata and, when enabled, the graph neighborhood of each candidate.
///
/// Candidates without related nodes pass through with score/rank metadata
/// only. Re-running augmentation is safe: metadata keys are overwritten and
/// the related-entities line is appended at most once, tracked by a metadata
/// flag so original content that happens to mention the header still gets
/// its real context line.
pub fn augment(candidates: Vec<FusedResult>, options: &RetrieverConfig) -> Vec<Document> {
    candidates
        .into_iter()
        .map(|candidate| augment_one(candidate, options))
        .collect()
}

fn augment_one(candidate: FusedResult, options: &RetrieverConfig) -> Document {
    let mut document = candidate.document;
    document.set_metadata("fused_score", json!(candidate.fused_score));
    document.set_metadata("vector_score", json!(candidate.vector_score));
    document.set_metadata("graph_score", json!(candidate.graph_score));
    document.set_metadata("rank", json!(candidate.rank));

    if !options.enable_context_augmentation || candidate.related_nodes.is_empty() {
        return document;
    }

    let mut labels: Vec<String> = Vec::new();
    for node in &candidate.related_nodes {
        let tag = node.display_tag();
        if !labels.contains(&tag) {
            labels.push(tag);
        }
    }

    document.set_metadata("related_entities", json!(labels));
    document.set_metadata("neighbor_count", json!(candidate.related_nodes.len()));
    // Traversal does not report per-node depth; the configured traversal
    // depth is the coarse upper bound we can attach.
    document.set_metadata("graph_depth", json!(options.max_traverse_depth));

    append_related_line(&mut document, &labels);
    document
}

fn append_related_line(document: &mut Document, labels: &[String]) {
    let already_augmented = document
        .metadata
        .get(AUGMENTED_FLAG)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if labels.is_empty() || already_augmented {
        return;
    }
    document.content.push_str("\n\n");
    document.content.push_str(RELATED_ENTITIES_HEADER);
    document.content.push(' ');
    document.content.push_str(&labels.join(", "));
    document.set_metadata(AUGMENTED_FLAG, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::GraphNode;

    fn candidate_with_nodes(nodes: Vec<GraphNode>) -> FusedResult {
        FusedResult {
            document: Document::new("d1", "base content"),
            vector_score: 0.6,
            graph_score: 0.4,
            fused_score: 0.5,
            rank: 1,
            related_nodes: nodes,
        }
    }

    #[test]
    fn scores_and_rank_always_land_in_metadata() {
        let docs = augment(
            vec![candidate_with_nodes(Vec::new())],
            &RetrieverConfig::default(),
        );
        let doc = &docs[0];
        assert_eq!(doc.metadata["rank"], json!(1));
        assert!(doc.metadata.contains_key("fused_score"));
        assert!(doc.metadata.contains_key("vector_score"));
        assert!(doc.metadata.contains_key("graph_score"));
        assert!(!doc.metadata.contains_key("related_entities"));
        assert_eq!(doc.content, "base content");
    }

    #[test]
    fn related_nodes_produce_deduplicated_labels_and_a_content_line() {
        let nodes = vec![
            GraphNode::new("n1", "Person", "Ada"),
            GraphNode::new("n2", "Person", "Ada"),
            GraphNode::new("n3", "Topic", "Computing"),
        ];
        let docs = augment(
            vec![candidate_with_nodes(nodes)],
            &RetrieverConfig::default(),
        );
        let doc = &docs[0];

        assert_eq!(
            doc.metadata["related_entities"],
            json!(["Ada (Person)", "Computing (Topic)"])
        );
        assert_eq!(doc.metadata["neighbor_count"], json!(3));
        assert!(doc.content.ends_with("Related Entities: Ada (Person), Computing (Topic)"));
    }

    #[test]
    fn augmentation_is_idempotent() {
        let nodes = vec![GraphNode::new("n1", "Topic", "Graphs")];
        let options = RetrieverConfig::default();

        let first_pass = augment(vec![candidate_with_nodes(nodes.clone())], &options);
        let again = FusedResult {
            document: first_pass[0].clone(),
            vector_score: 0.6,
            graph_score: 0.4,
            fused_score: 0.5,
            rank: 1,
            related_nodes: nodes,
        };
        let second_pass = augment(vec![again], &options);

        assert_eq!(first_pass[0].content, second_pass[0].content);
        assert_eq!(
            second_pass[0]
                .content
                .matches(RELATED_ENTITIES_HEADER)
                .count(),
            1
        );
    }

    #[test]
    fn content_mentioning_the_header_still_gets_augmented() {
        let mut candidate = candidate_with_nodes(vec![GraphNode::new("n1", "Topic", "Graphs")]);
        candidate.document = Document::new("d1", "Discusses the Related Entities: line format");

        let docs = augment(vec![candidate], &RetrieverConfig::default());

        assert!(docs[0].content.ends_with("Related Entities: Graphs (Topic)"));
        assert_eq!(docs[0].metadata[AUGMENTED_FLAG], json!(true));
    }

    #[test]
    fn disabled_augmentation_attaches_scores_only() {
        let options = RetrieverConfig {
            enable_context_augmentation: false,
            ..RetrieverConfig::default()
        };
        let nodes = vec![GraphNode::new("n1", "Topic", "Graphs")];
        let docs = augment(vec![candidate_with_nodes(nodes)], &options);

        assert!(docs[0].metadata.contains_key("fused_score"));
        assert!(!docs[0].metadata.contains_key("related_entities"));
        assert_eq!(docs[0].content, "base content");
    }

    #[test]
    fn graph_depth_reflects_configured_traversal_depth() {
        let options = RetrieverConfig {
            max_traverse_depth: 3,
            ..RetrieverConfig::default()
        };
        let nodes = vec![GraphNode::new("n1", "Topic", "Graphs")];
        let docs = augment(vec![candidate_with_nodes(nodes)], &options);
        assert_eq!(docs[0].metadata["graph_depth"], json!(3));
    }
}
