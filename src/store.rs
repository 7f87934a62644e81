//! In-process [SegmentStore] backed by an ordered list of segments.
//!
//! `MemoryStore` answers the same queries a remote store would, which makes it the store of
//! choice for the CLI (fed from a JSON dump) and for tests.

use parking_lot::RwLock;
use std::{
    collections::BTreeSet,
    fs::{read_to_string, write},
    path::Path,
};

use crate::{
    properties::{LinkHash, Segment},
    query::{Pagination, SegmentStore, SegmentsFilter, SegmentsPage},
    MapError,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    segments: RwLock<Vec<Segment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn from_segments<I: IntoIterator<Item = Segment>>(segments: I) -> Self {
        let mut store = Vec::new();
        let mut seen = BTreeSet::new();
        for segment in segments {
            if seen.insert(segment.link_hash) {
                store.push(segment);
            }
        }
        MemoryStore {
            segments: RwLock::new(store),
        }
    }

    /// Load a JSON array of segments. Segment hashes are verified against their content.
    pub fn from_dump<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        tracing::debug!("Reading segment dump {:?}", path.as_ref());
        let content = read_to_string(path)?;
        let segments: Vec<Segment> = serde_json::from_str(&content)?;
        for segment in segments.iter() {
            segment.verify()?;
        }
        Ok(MemoryStore::from_segments(segments))
    }

    pub fn save_dump<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let content = serde_json::to_string_pretty(&*self.segments.read())?;
        write(path, content)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.segments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.read().is_empty()
    }

    pub fn contains(&self, link_hash: &LinkHash) -> bool {
        self.segments
            .read()
            .iter()
            .any(|s| &s.link_hash == link_hash)
    }

    /// Store a new segment. The segment hash must match its content and must not already be
    /// stored.
    pub fn create_link(&self, segment: Segment) -> Result<Segment, MapError> {
        segment.verify()?;
        let mut segments = self.segments.write();
        if segments.iter().any(|s| s.link_hash == segment.link_hash) {
            return Err(MapError::Transport(format!(
                "segment {} already exists",
                segment.link_hash
            )));
        }
        segments.push(segment.clone());
        Ok(segment)
    }

    /// Store a batch of segments atomically: nothing is stored if any of them is rejected.
    pub fn create_link_batch(&self, batch: Vec<Segment>) -> Result<Vec<Segment>, MapError> {
        let mut segments = self.segments.write();
        let mut seen: BTreeSet<LinkHash> = segments.iter().map(|s| s.link_hash).collect();
        for segment in batch.iter() {
            segment.verify()?;
            if !seen.insert(segment.link_hash) {
                return Err(MapError::Transport(format!(
                    "segment {} already exists",
                    segment.link_hash
                )));
            }
        }
        segments.extend(batch.iter().cloned());
        Ok(batch)
    }

    fn page(&self, filter: &SegmentsFilter, page: &Pagination) -> SegmentsPage {
        let segments = self.segments.read();
        let matching = segments.iter().filter(|s| filter.matches(s));
        let total_count = matching.clone().count();
        SegmentsPage {
            segments: matching
                .skip(page.offset)
                .take(page.limit)
                .cloned()
                .collect(),
            total_count,
        }
    }

    fn map_ids(&self, process: &str, page: &Pagination) -> Vec<String> {
        let segments = self.segments.read();
        let mut seen = BTreeSet::new();
        segments
            .iter()
            .filter(|s| process.is_empty() || s.process == process)
            .filter(|s| seen.insert(s.map_id.as_str()))
            .map(|s| s.map_id.clone())
            .skip(page.offset)
            .take(page.limit)
            .collect()
    }
}

impl SegmentStore for MemoryStore {
    async fn find_segments(
        &self,
        filter: &SegmentsFilter,
        page: &Pagination,
    ) -> Result<SegmentsPage, MapError> {
        Ok(self.page(filter, page))
    }

    async fn get_segment(&self, link_hash: &str) -> Result<Option<Segment>, MapError> {
        let hash: LinkHash = link_hash.parse()?;
        Ok(self
            .segments
            .read()
            .iter()
            .find(|s| s.link_hash == hash)
            .cloned())
    }

    async fn get_map_ids(&self, process: &str, page: &Pagination) -> Result<Vec<String>, MapError> {
        Ok(self.map_ids(process, page))
    }
}
