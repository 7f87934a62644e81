//! Shared test utilities: segment fixtures and instrumented stores.

use parking_lot::Mutex;
use serde_json::json;

use crate::{
    properties::{Reference, Segment, SegmentBuilder},
    query::{Pagination, SegmentStore, SegmentsFilter, SegmentsPage},
    store::MemoryStore,
    MapError,
};

pub const TEST_PROCESS: &str = "test_process";
pub const TEST_MAP_ID: &str = "test_map";
pub const REF_PROCESS: &str = "ref_process";
pub const REF_MAP_ID: &str = "ref_map";

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A three segment map (`root` <- `s2`, `root` <- `s3`) where `s3` references `reference`,
/// a segment of another process.
pub struct MapFixture {
    pub root: Segment,
    pub s2: Segment,
    pub s3: Segment,
    pub reference: Segment,
}

impl MapFixture {
    pub fn new() -> Self {
        init_logging();
        let root = SegmentBuilder::new(TEST_PROCESS, TEST_MAP_ID)
            .with_step("init")
            .build()
            .unwrap();
        let s2 = SegmentBuilder::new(TEST_PROCESS, TEST_MAP_ID)
            .with_parent(root.link_hash)
            .with_step("process")
            .build()
            .unwrap();
        let reference = SegmentBuilder::new(REF_PROCESS, REF_MAP_ID).build().unwrap();
        let s3 = SegmentBuilder::new(TEST_PROCESS, TEST_MAP_ID)
            .with_parent(root.link_hash)
            .with_refs([Reference::new(reference.link_hash, REF_PROCESS)])
            .build()
            .unwrap();
        MapFixture {
            root,
            s2,
            s3,
            reference,
        }
    }

    pub fn map_without_refs(&self) -> Vec<Segment> {
        vec![self.root.clone(), self.s2.clone()]
    }

    pub fn map_with_refs(&self) -> Vec<Segment> {
        vec![self.root.clone(), self.s2.clone(), self.s3.clone()]
    }

    /// Map segments plus the referenced segment, as a store would hold them.
    pub fn all_segments(&self) -> Vec<Segment> {
        let mut segments = self.map_with_refs();
        segments.push(self.reference.clone());
        segments
    }
}

/// R (init) <- A (split, amount 2), R <- B (split, amount 5), B <- C (transfer).
pub struct SplitScenario {
    pub r: Segment,
    pub a: Segment,
    pub b: Segment,
    pub c: Segment,
}

impl SplitScenario {
    pub fn new(process: &str, map_id: &str) -> Self {
        init_logging();
        let r = SegmentBuilder::new(process, map_id)
            .with_step("init")
            .build()
            .unwrap();
        let a = SegmentBuilder::new(process, map_id)
            .with_parent(r.link_hash)
            .with_data(json!({ "amount": 2 }))
            .with_step("split")
            .build()
            .unwrap();
        let b = SegmentBuilder::new(process, map_id)
            .with_parent(r.link_hash)
            .with_data(json!({ "amount": 5 }))
            .with_step("split")
            .build()
            .unwrap();
        let c = SegmentBuilder::new(process, map_id)
            .with_parent(b.link_hash)
            .with_step("transfer")
            .build()
            .unwrap();
        SplitScenario { r, a, b, c }
    }

    pub fn segments(&self) -> Vec<Segment> {
        vec![self.a.clone(), self.c.clone(), self.r.clone(), self.b.clone()]
    }
}

/// A linear chain of `len` segments.
pub fn chain(process: &str, map_id: &str, len: usize) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for idx in 0..len {
        let mut builder = SegmentBuilder::new(process, map_id).with_data(json!({ "idx": idx }));
        if let Some(last) = segments.last() {
            builder = builder.with_parent(last.link_hash);
        }
        segments.push(builder.build().unwrap());
    }
    segments
}

/// A [MemoryStore] that records every call and can be told to misbehave.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    declared_total: Option<usize>,
    fail_find: bool,
    find_calls: Mutex<Vec<(SegmentsFilter, Pagination)>>,
    get_calls: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(segments: Vec<Segment>) -> Self {
        RecordingStore {
            inner: MemoryStore::from_segments(segments),
            ..Default::default()
        }
    }

    /// Report `total` as the collection size, whatever the store actually holds.
    pub fn with_declared_total(mut self, total: usize) -> Self {
        self.declared_total = Some(total);
        self
    }

    /// Fail every `find_segments` call with a transport error.
    pub fn failing(mut self) -> Self {
        self.fail_find = true;
        self
    }

    pub fn find_calls(&self) -> Vec<(SegmentsFilter, Pagination)> {
        self.find_calls.lock().clone()
    }

    pub fn find_offsets(&self) -> Vec<usize> {
        self.find_calls.lock().iter().map(|(_, p)| p.offset).collect()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.get_calls.lock().clone()
    }
}

impl SegmentStore for RecordingStore {
    async fn find_segments(
        &self,
        filter: &SegmentsFilter,
        page: &Pagination,
    ) -> Result<SegmentsPage, MapError> {
        self.find_calls.lock().push((filter.clone(), *page));
        if self.fail_find {
            return Err(MapError::Transport("connection refused".to_string()));
        }
        let mut response = self.inner.find_segments(filter, page).await?;
        if let Some(total) = self.declared_total {
            response.total_count = total;
        }
        Ok(response)
    }

    async fn get_segment(&self, link_hash: &str) -> Result<Option<Segment>, MapError> {
        self.get_calls.lock().push(link_hash.to_string());
        self.inner.get_segment(link_hash).await
    }
}

/// Answers every page request with the same segments, whatever the offset.
#[derive(Debug)]
pub struct RepeatingStore {
    pub page: Vec<Segment>,
    pub total_count: usize,
    pub calls: Mutex<usize>,
}

impl RepeatingStore {
    pub fn new(page: Vec<Segment>, total_count: usize) -> Self {
        RepeatingStore {
            page,
            total_count,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl SegmentStore for RepeatingStore {
    async fn find_segments(
        &self,
        _filter: &SegmentsFilter,
        _page: &Pagination,
    ) -> Result<SegmentsPage, MapError> {
        *self.calls.lock() += 1;
        Ok(SegmentsPage {
            segments: self.page.clone(),
            total_count: self.total_count,
        })
    }

    async fn get_segment(&self, _link_hash: &str) -> Result<Option<Segment>, MapError> {
        Ok(None)
    }
}
