//! The lossless view of a map: every segment once, every parent link and every reference.
//!
//! The layout tree can only give a node one parent, so references are folded into it
//! approximately. [`MapGraph`] keeps the structure the tree drops, and is what the builder
//! uses to find segments the root cannot reach.

use petgraph::{
    graphmap::GraphMap,
    visit::{depth_first_search, DfsEvent},
    Directed, Direction,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::properties::{LinkHash, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapEdge {
    /// Parent to child, along `parent_hash`.
    Parent,
    /// Referrer to a referenced segment of the same map.
    InternalRef,
    /// Referrer to a referenced segment owned by another map or process.
    ExternalRef,
}

pub type SegmentGraph = GraphMap<LinkHash, MapEdge, Directed>;

#[derive(Debug, Clone, Default)]
pub struct MapGraph {
    graph: SegmentGraph,
    in_map: BTreeSet<LinkHash>,
}

impl MapGraph {
    /// Build the graph of the map identified by `process` and `map_id`.
    ///
    /// Out-of-map segments only appear as reference targets. References to segments missing
    /// from `segments` are left out, as are parents missing from the map.
    pub fn from_segments(segments: &[Segment], process: &str, map_id: &str) -> Self {
        let present: BTreeSet<LinkHash> = segments.iter().map(|s| s.link_hash).collect();
        let in_map: BTreeSet<LinkHash> = segments
            .iter()
            .filter(|s| s.in_map(process, map_id))
            .map(|s| s.link_hash)
            .collect();

        let mut graph = SegmentGraph::new();
        for hash in in_map.iter() {
            graph.add_node(*hash);
        }
        let map_segments = segments
            .iter()
            .filter(|s| s.in_map(process, map_id))
            .collect::<Vec<_>>();
        let referenced: BTreeSet<LinkHash> = map_segments
            .iter()
            .flat_map(|s| s.refs.iter().map(|r| r.link_hash))
            .filter(|target| present.contains(target))
            .collect();
        // A parent outside the map counts when the map references it.
        for segment in map_segments.iter() {
            if let Some(parent) = segment
                .parent_hash
                .filter(|p| in_map.contains(p) || referenced.contains(p))
            {
                graph.add_edge(parent, segment.link_hash, MapEdge::Parent);
            }
        }
        // A reference that duplicates a parent link does not replace it.
        for segment in map_segments.iter() {
            for reference in segment.refs.iter() {
                let target = reference.link_hash;
                if graph.contains_edge(segment.link_hash, target) {
                    continue;
                }
                if in_map.contains(&target) {
                    graph.add_edge(segment.link_hash, target, MapEdge::InternalRef);
                } else if present.contains(&target) {
                    graph.add_edge(segment.link_hash, target, MapEdge::ExternalRef);
                }
            }
        }
        MapGraph { graph, in_map }
    }

    pub fn as_graph(&self) -> &SegmentGraph {
        &self.graph
    }

    pub fn is_in_map(&self, hash: &LinkHash) -> bool {
        self.in_map.contains(hash)
    }

    /// Segments of the map without a parent.
    pub fn roots(&self) -> Vec<LinkHash> {
        self.in_map
            .iter()
            .filter(|hash| {
                !self
                    .graph
                    .edges_directed(**hash, Direction::Incoming)
                    .any(|(_, _, kind)| *kind == MapEdge::Parent)
            })
            .copied()
            .collect()
    }

    pub fn edges_of_kind(&self, kind: MapEdge) -> Vec<(LinkHash, LinkHash)> {
        self.graph
            .all_edges()
            .filter(|(_, _, k)| **k == kind)
            .map(|(source, sink, _)| (source, sink))
            .collect()
    }

    /// Segments referenced by more than one segment. These are the nodes a single-parent tree
    /// cannot represent faithfully.
    pub fn shared_targets(&self) -> Vec<LinkHash> {
        self.graph
            .nodes()
            .filter(|hash| {
                self.graph
                    .edges_directed(*hash, Direction::Incoming)
                    .filter(|(_, _, kind)| **kind != MapEdge::Parent)
                    .count()
                    > 1
            })
            .collect()
    }

    /// Segments reachable from `root` along parent links. A referenced segment of another map
    /// is entered through its external reference edge, so the segments hanging off it are
    /// reached too.
    pub fn descendants(&self, root: LinkHash) -> BTreeSet<LinkHash> {
        let tree = SegmentGraph::from_edges(
            self.graph
                .all_edges()
                .filter(|(_, _, kind)| **kind != MapEdge::InternalRef)
                .map(|(source, sink, kind)| (source, sink, *kind)),
        );
        let mut reached = BTreeSet::from([root]);
        if tree.contains_node(root) {
            depth_first_search(&tree, Some(root), |event| {
                if let DfsEvent::Discover(hash, _) = event {
                    reached.insert(hash);
                }
            });
        }
        reached
    }

    /// In-map segments the root cannot reach, see [MapGraph::descendants].
    pub fn unreachable(&self, root: LinkHash) -> BTreeSet<LinkHash> {
        let reached = self.descendants(root);
        self.in_map.difference(&reached).copied().collect()
    }
}
