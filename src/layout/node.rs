use serde::{Deserialize, Serialize};

use crate::properties::Segment;

/// A positioned tree node derived from a segment.
///
/// `id` is the hex link hash of the source segment. External references appear as leaf
/// nodes hanging off each segment that references them, so their `id` may occur more than once
/// in a tree; in-map segments occur exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub step: String,
    pub is_external_ref: bool,
    /// Ids of in-map segments this node references without being their tree child. Drawn as
    /// auxiliary (dashed) connectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_ref_ids: Vec<String>,
    pub depth: usize,
    pub height: usize,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Shortened id for labels.
    pub fn short_id(&self) -> String {
        let cut = self
            .id
            .char_indices()
            .nth(6)
            .map(|(idx, _)| idx)
            .unwrap_or(self.id.len());
        format!("{}...", &self.id[..cut])
    }

    /// This node and all nodes below it, in pre-order.
    pub fn descendants(&self) -> Vec<&LayoutNode> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.iter().rev());
        }
        nodes
    }

    /// Parent/child pairs, in pre-order of the parent.
    pub fn links(&self) -> Vec<(&LayoutNode, &LayoutNode)> {
        self.descendants()
            .into_iter()
            .flat_map(|node| node.children.iter().map(move |child| (node, child)))
            .collect()
    }

    /// Auxiliary (referrer id, referenced id) connectors between in-map segments.
    pub fn internal_links(&self) -> Vec<(&str, &str)> {
        self.descendants()
            .into_iter()
            .flat_map(|node| {
                node.internal_ref_ids
                    .iter()
                    .map(move |target| (node.id.as_str(), target.as_str()))
            })
            .collect()
    }

    /// First node with `id`, in pre-order.
    pub fn find(&self, id: &str) -> Option<&LayoutNode> {
        self.descendants().into_iter().find(|n| n.id == id)
    }
}

/// The segment a rendered node was built from.
pub fn find_segment<'a>(id: &str, segments: &'a [Segment]) -> Option<&'a Segment> {
    segments.iter().find(|s| s.link_hash.to_hex() == id)
}
