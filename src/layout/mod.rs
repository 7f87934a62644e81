//! Layout module: from a flat segment list to a positioned, renderable tree.
//!
//! # Module Organization
//!
//! - `builder`: [`LayoutBuilder`], classification of references and tree assembly
//! - `node`: [`LayoutNode`] and helpers used while rendering
//! - `graph`: [`MapGraph`], the lossless DAG view of a map
//! - `tidy`: coordinate assignment
//!
//! ```rust
//! use mapview_core::{layout::build_layout, properties::SegmentBuilder};
//!
//! let root = SegmentBuilder::new("p", "m").with_step("init").build().unwrap();
//! let child = SegmentBuilder::new("p", "m")
//!     .with_parent(root.link_hash)
//!     .with_step("sign")
//!     .build()
//!     .unwrap();
//! let tree = build_layout(&[child.clone(), root.clone()], "p", "m").unwrap();
//! assert_eq!(tree.id, root.id());
//! assert_eq!(tree.children[0].id, child.id());
//! ```

mod builder;
mod graph;
mod node;
mod tidy;


pub use builder::{LayoutBuilder, DEFAULT_NODE_SIZE};
pub use graph::{MapEdge, MapGraph, SegmentGraph};
pub use node::{find_segment, LayoutNode};

use crate::{properties::Segment, MapError};

/// Lay out the map identified by `process` and `map_id` with the default node size.
pub fn build_layout(
    segments: &[Segment],
    process: &str,
    map_id: &str,
) -> Result<LayoutNode, MapError> {
    LayoutBuilder::default().build(segments, process, map_id)
}
