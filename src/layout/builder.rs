use std::collections::{BTreeMap, BTreeSet};

use crate::{
    properties::{LinkHash, Segment},
    MapError,
};

use super::{
    graph::MapGraph,
    node::LayoutNode,
    tidy::{pre_order, tidy_positions},
};

/// Distance between neighbouring nodes, and between depth levels.
pub const DEFAULT_NODE_SIZE: f64 = 150.0;

/// Node under construction, addressed by its index in the arena.
#[derive(Debug)]
struct DraftNode<'a> {
    segment: &'a Segment,
    parent: Option<usize>,
    is_external_ref: bool,
    internal_ref_ids: Vec<String>,
    children: Vec<usize>,
}

/// Turns a flat segment list into a positioned tree rooted at the map's parentless segment.
///
/// Non-tree edges are handled with a lossy policy:
/// - a reference to another segment of the same map is recorded in the referrer's
///   `internal_ref_ids`, the tree keeps following `parent_hash`;
/// - a reference to a segment of another map becomes an external leaf under the referrer,
///   once per referrer;
/// - a segment whose parent is such a referenced segment hangs under the first copy of it
///   reachable from the root (in referrer order);
/// - a reference whose target is not in the segment list is dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBuilder {
    node_size: f64,
}

impl Default for LayoutBuilder {
    fn default() -> Self {
        LayoutBuilder {
            node_size: DEFAULT_NODE_SIZE,
        }
    }
}

impl LayoutBuilder {
    /// `node_size` must be a positive, finite distance.
    pub fn new(node_size: f64) -> Result<Self, MapError> {
        if !node_size.is_finite() || node_size <= 0.0 {
            return Err(MapError::Config(format!(
                "node_size must be a positive number, got {node_size}"
            )));
        }
        Ok(LayoutBuilder { node_size })
    }

    pub fn node_size(&self) -> f64 {
        self.node_size
    }

    pub fn build(
        &self,
        segments: &[Segment],
        process: &str,
        map_id: &str,
    ) -> Result<LayoutNode, MapError> {
        // Classification: first occurrence of each hash wins.
        let mut by_hash: BTreeMap<LinkHash, &Segment> = BTreeMap::new();
        let mut in_map: Vec<&Segment> = Vec::new();
        for segment in segments.iter() {
            if by_hash.contains_key(&segment.link_hash) {
                continue;
            }
            by_hash.insert(segment.link_hash, segment);
            if segment.in_map(process, map_id) {
                in_map.push(segment);
            }
        }
        // Sibling order must not depend on the order segments were loaded in.
        in_map.sort_by_key(|s| s.link_hash);
        let map_hashes: BTreeSet<LinkHash> = in_map.iter().map(|s| s.link_hash).collect();

        let roots: Vec<&Segment> = in_map
            .iter()
            .filter(|s| s.parent_hash.is_none())
            .copied()
            .collect();
        if roots.len() != 1 {
            return Err(MapError::NoRoot { count: roots.len() });
        }
        let root = roots[0];

        // External segments the map references. An in-map segment may hang off one of them.
        let referenced: BTreeSet<LinkHash> = in_map
            .iter()
            .flat_map(|s| s.refs.iter().map(|r| r.link_hash))
            .filter(|target| !map_hashes.contains(target) && by_hash.contains_key(target))
            .collect();
        for segment in in_map.iter() {
            if let Some(parent) = segment.parent_hash {
                if !map_hashes.contains(&parent) && !referenced.contains(&parent) {
                    return Err(MapError::DisconnectedNode {
                        id: segment.id(),
                        parent_id: parent.to_hex(),
                    });
                }
            }
        }
        let unreachable = MapGraph::from_segments(segments, process, map_id)
            .unreachable(root.link_hash);
        if let Some(stray) = in_map.iter().find(|s| unreachable.contains(&s.link_hash)) {
            return Err(MapError::DisconnectedNode {
                id: stray.id(),
                parent_id: stray.parent_id().unwrap_or_default(),
            });
        }

        let mut arena: Vec<DraftNode> = in_map
            .iter()
            .map(|&segment| DraftNode {
                segment,
                parent: None,
                is_external_ref: false,
                internal_ref_ids: Vec::new(),
                children: Vec::new(),
            })
            .collect();
        let index: BTreeMap<LinkHash, usize> = in_map
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.link_hash, idx))
            .collect();

        // Segments whose parent is an external segment, attached once the leaves exist.
        let mut pending: Vec<(usize, LinkHash)> = Vec::new();
        for idx in 0..in_map.len() {
            if let Some(parent) = in_map[idx].parent_hash {
                match index.get(&parent) {
                    Some(&parent_idx) => {
                        arena[idx].parent = Some(parent_idx);
                        arena[parent_idx].children.push(idx);
                    }
                    None => pending.push((idx, parent)),
                }
            }
        }

        // Arena indices of the external leaves of each target, in referrer order.
        let mut copies: BTreeMap<LinkHash, Vec<usize>> = BTreeMap::new();
        for idx in 0..in_map.len() {
            let mut seen_external = BTreeSet::new();
            for reference in in_map[idx].refs.iter() {
                let target = reference.link_hash;
                if map_hashes.contains(&target) {
                    let target_id = target.to_hex();
                    if !arena[idx].internal_ref_ids.contains(&target_id) {
                        arena[idx].internal_ref_ids.push(target_id);
                    }
                } else if let Some(external) = by_hash.get(&target) {
                    if !seen_external.insert(target) {
                        continue;
                    }
                    let ext_idx = arena.len();
                    arena.push(DraftNode {
                        segment: *external,
                        parent: Some(idx),
                        is_external_ref: true,
                        internal_ref_ids: Vec::new(),
                        children: Vec::new(),
                    });
                    arena[idx].children.push(ext_idx);
                    copies.entry(target).or_default().push(ext_idx);
                } else {
                    tracing::trace!(
                        "Dropping reference from {} to unavailable segment {}",
                        in_map[idx].link_hash,
                        target
                    );
                }
            }
        }

        let root_idx = index[&root.link_hash];
        self.attach_to_external_parents(&mut arena, root_idx, pending, &copies)?;

        Ok(self.assemble(arena, root_idx))
    }

    /// Hang each pending segment under the first copy of its parent already reachable from
    /// the root. Attaching only to reachable nodes keeps the arena acyclic.
    fn attach_to_external_parents(
        &self,
        arena: &mut [DraftNode<'_>],
        root: usize,
        mut pending: Vec<(usize, LinkHash)>,
        copies: &BTreeMap<LinkHash, Vec<usize>>,
    ) -> Result<(), MapError> {
        while !pending.is_empty() {
            let children: Vec<Vec<usize>> = arena.iter().map(|n| n.children.clone()).collect();
            let reachable: BTreeSet<usize> = pre_order(&children, root).into_iter().collect();
            let before = pending.len();
            pending.retain(|&(idx, parent)| {
                let copy = copies
                    .get(&parent)
                    .and_then(|found| found.iter().copied().find(|c| reachable.contains(c)));
                match copy {
                    Some(copy) => {
                        arena[idx].parent = Some(copy);
                        arena[copy].children.push(idx);
                        false
                    }
                    None => true,
                }
            });
            if pending.len() == before {
                let (idx, parent) = pending[0];
                return Err(MapError::DisconnectedNode {
                    id: arena[idx].segment.id(),
                    parent_id: parent.to_hex(),
                });
            }
        }
        Ok(())
    }

    /// Compute depth, height and coordinates, then fold the arena into nested nodes.
    fn assemble(&self, arena: Vec<DraftNode<'_>>, root: usize) -> LayoutNode {
        let children: Vec<Vec<usize>> = arena.iter().map(|n| n.children.clone()).collect();
        let order = pre_order(&children, root);
        let xs = tidy_positions(&children, root, self.node_size);

        let mut depth = vec![0usize; arena.len()];
        for &idx in order.iter() {
            for &kid in &children[idx] {
                depth[kid] = depth[idx] + 1;
            }
        }
        let mut height = vec![0usize; arena.len()];
        for &idx in order.iter().rev() {
            if let Some(parent) = arena[idx].parent {
                height[parent] = height[parent].max(height[idx] + 1);
            }
        }

        let mut built: Vec<Option<LayoutNode>> = arena.iter().map(|_| None).collect();
        for &idx in order.iter().rev() {
            let draft = &arena[idx];
            let node_children = draft
                .children
                .iter()
                .filter_map(|kid| built[*kid].take())
                .collect();
            built[idx] = Some(LayoutNode {
                id: draft.segment.id(),
                parent_id: draft.parent.map(|p| arena[p].segment.id()),
                step: draft.segment.step.clone(),
                is_external_ref: draft.is_external_ref,
                internal_ref_ids: draft.internal_ref_ids.clone(),
                depth: depth[idx],
                height: height[idx],
                x: xs[idx],
                y: depth[idx] as f64 * self.node_size,
                children: node_children,
            });
        }
        built[root]
            .take()
            .expect("the pre-order walk starts at the root")
    }
}
