//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

use mapview_core::{
    properties::{Reference, Segment, SegmentBuilder},
    store::MemoryStore,
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times. Subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// An auction map: `open` with two `bid`s, the second one `close`d, plus a `registry` entry of
/// another process referenced by both bids.
#[allow(dead_code)]
pub struct Auction {
    pub open: Segment,
    pub bid1: Segment,
    pub bid2: Segment,
    pub close: Segment,
    pub registry: Segment,
}

#[allow(dead_code)]
impl Auction {
    pub fn new() -> Self {
        let registry = SegmentBuilder::new("registry", "bidders")
            .with_step("register")
            .with_data(serde_json::json!({ "name": "alice" }))
            .build()
            .unwrap();
        let bidder = Reference::new(registry.link_hash, "registry");
        let open = SegmentBuilder::new("auction", "lot-7")
            .with_step("open")
            .build()
            .unwrap();
        let bid1 = SegmentBuilder::new("auction", "lot-7")
            .with_parent(open.link_hash)
            .with_step("bid")
            .with_data(serde_json::json!({ "amount": 10 }))
            .with_refs([bidder.clone()])
            .build()
            .unwrap();
        let bid2 = SegmentBuilder::new("auction", "lot-7")
            .with_parent(open.link_hash)
            .with_step("bid")
            .with_data(serde_json::json!({ "amount": 12 }))
            .with_refs([bidder, Reference::new(bid1.link_hash, "auction")])
            .build()
            .unwrap();
        let close = SegmentBuilder::new("auction", "lot-7")
            .with_parent(bid2.link_hash)
            .with_step("close")
            .build()
            .unwrap();
        Auction {
            open,
            bid1,
            bid2,
            close,
            registry,
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        vec![
            self.close.clone(),
            self.bid2.clone(),
            self.registry.clone(),
            self.open.clone(),
            self.bid1.clone(),
        ]
    }
}

/// Write `segments` as a JSON dump inside `temp_dir` and return its path.
#[allow(dead_code)]
pub fn write_dump(temp_dir: &TempDir, segments: Vec<Segment>) -> PathBuf {
    let path = temp_dir.path().join("segments.json");
    MemoryStore::from_segments(segments)
        .save_dump(&path)
        .unwrap();
    path
}
