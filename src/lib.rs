//! # mapview-core
//!
//! Loads a process map out of a segment store and turns it into a positioned tree ready to be
//! drawn.
//!
//! ## Overview
//!
//! A map is a set of linked segments sharing a process and a map id. Each segment points to
//! its parent through `parent_hash` and may reference any other segment, in the same map or
//! elsewhere. Exactly one segment of a map has no parent: the root.
//!
//! Getting from a store to a drawing happens in three steps:
//!
//! 1. **Loading** ([`loader::MapLoader`]): page through `find_segments` until the declared
//!    total has been received. Pages are requested one at a time.
//! 2. **Resolving** ([`loader::ReferenceResolver`]): fetch each segment referenced from the
//!    map once, in discovery order. Targets the store no longer has are dropped.
//! 3. **Layout** ([`layout::LayoutBuilder`]): build the parent tree, attach references, and
//!    assign depth, height and tidy `x`/`y` coordinates.
//!
//! [`explorer::MapExplorer`] runs the three steps, reports [`event::MapEvent`]s along the way
//! and numbers requests so a display can drop stale results.
//!
//! ## Quick Start
//!
//! ```rust
//! use mapview_core::{
//!     explorer::MapExplorer, properties::SegmentBuilder, store::MemoryStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), mapview_core::MapError> {
//!     let root = SegmentBuilder::new("chat", "room").with_step("init").build()?;
//!     let reply = SegmentBuilder::new("chat", "room")
//!         .with_parent(root.link_hash)
//!         .with_step("message")
//!         .build()?;
//!     let store = MemoryStore::from_segments([root, reply]);
//!
//!     let explorer = MapExplorer::new(store, None);
//!     let view = explorer.explore("chat", "room").await?;
//!     assert_eq!(view.root.height, 1);
//!     for node in view.root.descendants() {
//!         println!("{} ({}) at {},{}", node.short_id(), node.step, node.x, node.y);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: library only
//! - **bin**: the `mapview` command line tool

pub mod config;
pub mod error;
pub mod event;
pub mod explorer;
pub mod layout;
pub mod loader;
pub mod properties;
pub mod query;
pub mod store;
#[cfg(test)]
mod tests;

pub use error::*;
